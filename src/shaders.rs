//! GLSL shader sources and compilation helpers.
//!
//! All shaders target GLSL 1.40 (OpenGL 3.1). Positions arrive in pixels with
//! the origin at the bottom-left corner and y pointing up, the same
//! orientation as glyph outlines, so no flip happens on the way to NDC.

use glow::HasContext;

/// Attribute location of `a_position` in every program.
pub const POSITION_LOCATION: u32 = 0;

/// Attribute location of the per-vertex attribute stream (`a_uv` or
/// `a_klm`).
pub const ATTRIBUTE_LOCATION: u32 = 1;

/// Vertex shader for atlas quads.
///
/// # Uniforms
///
/// | Name           | Type   | Description             |
/// |----------------|--------|-------------------------|
/// | `u_resolution` | `vec2` | Viewport size in pixels |
pub const ATLAS_VERTEX_SRC: &str = r"#version 140

in vec2 a_position;
in vec2 a_uv;

uniform vec2 u_resolution;

out vec2 v_uv;

void main() {
    v_uv = a_uv;
    gl_Position = vec4((a_position / u_resolution) * 2.0 - 1.0, 0.0, 1.0);
}
";

/// Fragment shader for atlas quads: the red channel is coverage.
///
/// # Uniforms
///
/// | Name      | Type        | Description                  |
/// |-----------|-------------|------------------------------|
/// | `u_atlas` | `sampler2D` | Coverage atlas (unit 0)      |
/// | `u_color` | `vec4`      | Text color, straight alpha   |
pub const ATLAS_FRAGMENT_SRC: &str = r"#version 140

in vec2 v_uv;

uniform sampler2D u_atlas;
uniform vec4 u_color;

out vec4 frag_color;

void main() {
    float coverage = texture(u_atlas, v_uv).r;
    frag_color = vec4(u_color.rgb * u_color.a, u_color.a) * coverage;
}
";

/// Vertex shader for Loop–Blinn triangles.
///
/// # Uniforms
///
/// | Name           | Type   | Description             |
/// |----------------|--------|-------------------------|
/// | `u_resolution` | `vec2` | Viewport size in pixels |
pub const CURVE_VERTEX_SRC: &str = r"#version 140

in vec2 a_position;
in vec3 a_klm;

uniform vec2 u_resolution;

out vec3 v_klm;

void main() {
    v_klm = a_klm;
    gl_Position = vec4((a_position / u_resolution) * 2.0 - 1.0, 0.0, 1.0);
}
";

/// Fragment shader for Loop–Blinn triangles.
///
/// Evaluates `f = k³ - l·m`; the fragment is inside when `f < 0`. Solid
/// triangles carry `(0, 1, 1)` and always pass. In color mode the edge is
/// antialiased with the screen-space gradient of `f`; in stencil mode
/// outside fragments are discarded and coverage is resolved by the stencil
/// count.
///
/// # Uniforms
///
/// | Name             | Type   | Description                         |
/// |------------------|--------|-------------------------------------|
/// | `u_color`        | `vec4` | Text color, straight alpha          |
/// | `u_stencil_mode` | `bool` | Discard outside instead of blending |
pub const CURVE_FRAGMENT_SRC: &str = r"#version 140

in vec3 v_klm;

uniform vec4 u_color;
uniform bool u_stencil_mode;

out vec4 frag_color;

void main() {
    float k = v_klm.x;
    float l = v_klm.y;
    float m = v_klm.z;
    float f = k * k * k - l * m;

    if (u_stencil_mode) {
        if (f >= 0.0) {
            discard;
        }
        frag_color = vec4(0.0);
        return;
    }

    vec3 dx = dFdx(v_klm);
    vec3 dy = dFdy(v_klm);
    vec2 grad = vec2(
        3.0 * k * k * dx.x - m * dx.y - l * dx.z,
        3.0 * k * k * dy.x - m * dy.y - l * dy.z
    );
    // Signed distance in pixels, negative inside.
    float distance = f / max(length(grad), 1e-6);
    float coverage = clamp(0.5 - distance, 0.0, 1.0);
    if (coverage <= 0.0) {
        discard;
    }
    frag_color = vec4(u_color.rgb * u_color.a, u_color.a) * coverage;
}
";

/// Vertex shader for stencil fans and cover quads: positions only.
///
/// # Uniforms
///
/// | Name           | Type   | Description             |
/// |----------------|--------|-------------------------|
/// | `u_resolution` | `vec2` | Viewport size in pixels |
pub const SOLID_VERTEX_SRC: &str = r"#version 140

in vec2 a_position;

uniform vec2 u_resolution;

void main() {
    gl_Position = vec4((a_position / u_resolution) * 2.0 - 1.0, 0.0, 1.0);
}
";

/// Fragment shader writing a flat color.
///
/// # Uniforms
///
/// | Name      | Type   | Description                |
/// |-----------|--------|----------------------------|
/// | `u_color` | `vec4` | Text color, straight alpha |
pub const SOLID_FRAGMENT_SRC: &str = r"#version 140

uniform vec4 u_color;

out vec4 frag_color;

void main() {
    frag_color = vec4(u_color.rgb * u_color.a, u_color.a);
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// `a_position` is bound to [`POSITION_LOCATION`] and `attribute`, if any,
/// to [`ATTRIBUTE_LOCATION`] before linking. The compiled shader objects are
/// detached and deleted after successful linking, so only the program handle
/// needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns a descriptive error string if shader compilation or program
/// linking fails.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
    attribute: Option<&str>,
) -> Result<glow::Program, String> {
    let program = unsafe { gl.create_program() }?;

    let vs = unsafe { compile_shader(gl, glow::VERTEX_SHADER, vertex_src) }?;
    let fs = unsafe { compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src) }?;

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.bind_attrib_location(program, POSITION_LOCATION, "a_position");
        if let Some(name) = attribute {
            gl.bind_attrib_location(program, ATTRIBUTE_LOCATION, name);
        }
        gl.link_program(program);

        if !gl.get_program_link_status(program) {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(format!("Program link error: {log}"));
        }

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader, String> {
    unsafe {
        let shader = gl.create_shader(shader_type)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(format!("Shader compile error: {log}"));
        }

        Ok(shader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_shader_uses_the_documented_implicit_form() {
        assert!(CURVE_FRAGMENT_SRC.contains("k * k * k - l * m"));
        assert!(CURVE_FRAGMENT_SRC.contains("f >= 0.0"));
    }

    #[test]
    fn attribute_names_match_between_stages() {
        assert!(ATLAS_VERTEX_SRC.contains("in vec2 a_uv"));
        assert!(CURVE_VERTEX_SRC.contains("in vec3 a_klm"));
        for src in [ATLAS_VERTEX_SRC, CURVE_VERTEX_SRC, SOLID_VERTEX_SRC] {
            assert!(src.starts_with("#version 140"));
            assert!(src.contains("in vec2 a_position"));
        }
    }
}
