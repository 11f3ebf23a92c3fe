//! The compositor's distortion pass: each eye's image is drawn onto one half
//! of a static stereo quad mesh.

use std::num::NonZeroU32;

use bytemuck::{Pod, Zeroable};
use glow::HasContext;
use tracing::warn;

use crate::error::XrError;
use crate::graphics::ComposedView;
use crate::types::Result;

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

const fn vertex(x: f32, y: f32, u: f32, v: f32) -> Vertex {
    Vertex {
        position: [x, y],
        uv: [u, v],
    }
}

const fn quad(left: f32, right: f32) -> [Vertex; 6] {
    const BOTTOM: f32 = -0.8;
    const TOP: f32 = 0.8;
    [
        vertex(left, BOTTOM, 0.0, 0.0),
        vertex(right, BOTTOM, 1.0, 0.0),
        vertex(right, TOP, 1.0, 1.0),
        vertex(left, BOTTOM, 0.0, 0.0),
        vertex(right, TOP, 1.0, 1.0),
        vertex(left, TOP, 0.0, 1.0),
    ]
}

const VERTICES_PER_EYE: i32 = 6;

/// Two side-by-side rectangles, left eye first.
pub const STEREO_QUAD: [Vertex; 12] = {
    let left = quad(-0.9, -0.1);
    let right = quad(0.1, 0.9);
    [
        left[0], left[1], left[2], left[3], left[4], left[5], right[0], right[1], right[2],
        right[3], right[4], right[5],
    ]
};

/// First vertex and vertex count of `eye` in [`STEREO_QUAD`].
pub fn eye_range(eye: usize) -> (i32, i32) {
    (VERTICES_PER_EYE * eye as i32, VERTICES_PER_EYE)
}

pub const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

const POSITION_ATTRIBUTE: u32 = 0;
const UV_ATTRIBUTE: u32 = 1;

const VERTEX_SHADER: &str = "
  #version 130
  in vec2 position;
  in vec2 uv;
  uniform vec4 uv_rect;
  out vec2 v_uv;
  out vec2 v_quad;
  void main(void) {
    v_quad = uv;
    v_uv = uv_rect.xy + uv * uv_rect.zw;
    gl_Position = vec4(position, 0.0, 1.0);
  }
";

// 10% of the output is a tint keyed on the quad coordinates, so composited
// frames are visibly distinct from a plain blit.
const FRAGMENT_SHADER: &str = "
  #version 130
  uniform sampler2D image;
  in vec2 v_uv;
  in vec2 v_quad;
  void main() {
    vec4 tint = vec4(v_quad, 1.0 - v_quad.x, 1.0);
    gl_FragColor = mix(texture(image, v_uv), tint, 0.1);
  }
";

pub struct StereoQuadPass {
    program: glow::NativeProgram,
    vao: glow::NativeVertexArray,
    buffer: glow::NativeBuffer,
    uv_rect: Option<glow::NativeUniformLocation>,
}

impl StereoQuadPass {
    /// # Safety
    ///
    /// `gl` must be current on the calling thread.
    pub unsafe fn new(gl: &glow::Context) -> Result<Self> {
        let buffer = gl.create_buffer().map_err(gl_failure)?;
        let vao = gl.create_vertex_array().map_err(gl_failure)?;
        gl.bind_vertex_array(Some(vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(&STEREO_QUAD),
            glow::STATIC_DRAW,
        );
        let stride = std::mem::size_of::<Vertex>() as i32;
        gl.vertex_attrib_pointer_f32(POSITION_ATTRIBUTE, 2, glow::FLOAT, false, stride, 0);
        gl.enable_vertex_attrib_array(POSITION_ATTRIBUTE);
        gl.vertex_attrib_pointer_f32(UV_ATTRIBUTE, 2, glow::FLOAT, false, stride, 8);
        gl.enable_vertex_attrib_array(UV_ATTRIBUTE);
        gl.bind_vertex_array(None);

        let program = match compile_program(gl) {
            Ok(program) => program,
            Err(err) => {
                gl.delete_vertex_array(vao);
                gl.delete_buffer(buffer);
                return Err(err);
            }
        };
        gl.use_program(Some(program));
        let image = gl.get_uniform_location(program, "image");
        gl.uniform_1_i32(image.as_ref(), 0);
        let uv_rect = gl.get_uniform_location(program, "uv_rect");
        gl.use_program(None);

        Ok(Self {
            program,
            vao,
            buffer,
            uv_rect,
        })
    }

    /// Clears the target and draws every view onto its half of the mesh.
    ///
    /// # Safety
    ///
    /// `gl` must be current, and every texture in `views` must be visible to
    /// it.
    pub unsafe fn draw(&self, gl: &glow::Context, views: &[ComposedView], size: (u32, u32)) {
        gl.viewport(0, 0, size.0 as i32, size.1 as i32);
        let [r, g, b, a] = CLEAR_COLOR;
        gl.clear_color(r, g, b, a);
        gl.clear(glow::COLOR_BUFFER_BIT);

        gl.use_program(Some(self.program));
        gl.bind_vertex_array(Some(self.vao));
        gl.active_texture(glow::TEXTURE0);
        for view in views {
            let Some(texture) = NonZeroU32::new(view.texture).map(glow::NativeTexture) else {
                continue;
            };
            let [u, v, w, h] = view.uv_rect();
            gl.uniform_4_f32(self.uv_rect.as_ref(), u, v, w, h);
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            let (first, count) = eye_range(view.eye.min(1));
            gl.draw_arrays(glow::TRIANGLES, first, count);
        }
        gl.bind_texture(glow::TEXTURE_2D, None);
        gl.bind_vertex_array(None);
        gl.use_program(None);

        let error = gl.get_error();
        if error != glow::NO_ERROR {
            warn!("GL error {error:#x} while compositing");
        }
    }

    /// # Safety
    ///
    /// `gl` must be the context this pass was created with, current on the
    /// calling thread.
    pub unsafe fn destroy(self, gl: &glow::Context) {
        gl.delete_program(self.program);
        gl.delete_vertex_array(self.vao);
        gl.delete_buffer(self.buffer);
    }
}

unsafe fn compile_program(gl: &glow::Context) -> Result<glow::NativeProgram> {
    let program = gl.create_program().map_err(gl_failure)?;
    let mut shaders = Vec::with_capacity(2);
    for (kind, source) in [
        (glow::VERTEX_SHADER, VERTEX_SHADER),
        (glow::FRAGMENT_SHADER, FRAGMENT_SHADER),
    ] {
        let shader = gl.create_shader(kind).map_err(gl_failure)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            for shader in shaders {
                gl.delete_shader(shader);
            }
            gl.delete_program(program);
            return Err(XrError::RuntimeFailure(
                format!("failed to compile compositor shader: {log}").into(),
            ));
        }
        gl.attach_shader(program, shader);
        shaders.push(shader);
    }
    gl.bind_attrib_location(program, POSITION_ATTRIBUTE, "position");
    gl.bind_attrib_location(program, UV_ATTRIBUTE, "uv");
    gl.link_program(program);
    for shader in shaders {
        gl.detach_shader(program, shader);
        gl.delete_shader(shader);
    }
    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(XrError::RuntimeFailure(
            format!("failed to link compositor program: {log}").into(),
        ));
    }
    Ok(program)
}

fn gl_failure(message: String) -> XrError {
    XrError::RuntimeFailure(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eyes_occupy_opposite_halves() {
        let (left_first, left_count) = eye_range(0);
        let (right_first, right_count) = eye_range(1);
        assert_eq!((left_first, left_count), (0, 6));
        assert_eq!((right_first, right_count), (6, 6));

        let left = &STEREO_QUAD[..6];
        let right = &STEREO_QUAD[6..];
        assert!(left.iter().all(|v| (-0.9..=-0.1).contains(&v.position[0])));
        assert!(right.iter().all(|v| (0.1..=0.9).contains(&v.position[0])));
        assert!(STEREO_QUAD
            .iter()
            .all(|v| (-0.8..=0.8).contains(&v.position[1])));
    }

    #[test]
    fn each_eye_covers_the_full_texture() {
        for half in STEREO_QUAD.chunks(6) {
            for corner in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]] {
                assert!(half.iter().any(|v| v.uv == corner));
            }
        }
    }

    #[test]
    fn vertices_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 16);
        assert_eq!(bytemuck::cast_slice::<_, u8>(&STEREO_QUAD).len(), 12 * 16);
    }
}
