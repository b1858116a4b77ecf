//! Call classification: decoded call name → state-sort operations.
//!
//! This is the analyzer's front end. Each recognized call is lowered to zero
//! or more [`SortOp`]s naming the change kind, the target slot, the resource
//! handle, and any uploaded payload. Multi-slot binds (`IASetVertexBuffers`,
//! `*SetConstantBuffers`) fan out to one op per slot. Unrecognized call names
//! lower to nothing.
//!
//! The classifier is deliberately permissive about argument shapes: accessors
//! on the decoded values coerce or read as zero, so a malformed call degrades
//! to a dropped op instead of an error.

use std::borrow::Cow;

use tracing::warn;

use statetrace_model::{Call, Value};

use crate::bins::{Bin, ChangeKind, Slot};

/// GL object names are small integers shared across object kinds, and they
/// collide with D3D pointers near zero. Texture and shader names get fixed
/// biases so the resource map keys stay disjoint.
const TEXTURE_HANDLE_BIAS: u64 = 10_000;
const SHADER_HANDLE_BIAS: u64 = 20_000;

/// At most five vertex-buffer / constant-buffer slots are modelled; wider
/// bind calls are clamped.
const MAX_FANOUT_SLOTS: usize = 5;

mod gl {
    pub const ARRAY_BUFFER: i64 = 0x8892;
    pub const ELEMENT_ARRAY_BUFFER: i64 = 0x8893;
    pub const RGB: i64 = 0x1907;
    pub const RGBA: i64 = 0x1908;
    pub const BGR: i64 = 0x80E0;
    pub const BGRA: i64 = 0x80E1;
    pub const UNSIGNED_SHORT: i64 = 0x1403;
    pub const INT: i64 = 0x1404;
    pub const UNSIGNED_INT: i64 = 0x1405;
    pub const FLOAT: i64 = 0x1406;
}

/// One state-sort operation derived from a decoded call.
#[derive(Debug, Clone, PartialEq)]
pub struct SortOp<'a> {
    pub change: ChangeKind,
    /// Short display name used by the textual record stream.
    pub name: &'static str,
    /// Small integer written into the binary record header.
    pub name_id: u8,
    pub slot: Slot,
    /// Handle of the object being created/bound/updated.
    pub object: u64,
    /// Secondary handle used as a bin-resolution fallback.
    pub data: u64,
    /// Uploaded bytes, when the call carries any inline.
    pub payload: Option<Cow<'a, [u8]>>,
    /// Payload size, primitive count for draws, zero otherwise.
    pub size: i32,
}

impl<'a> SortOp<'a> {
    fn new(change: ChangeKind, name: &'static str, name_id: u8, slot: Slot) -> Self {
        Self {
            change,
            name,
            name_id,
            slot,
            object: 0,
            data: 0,
            payload: None,
            size: 0,
        }
    }
}

fn handle_payload(handle: u64) -> Option<Cow<'static, [u8]>> {
    Some(Cow::Owned(handle.to_le_bytes().to_vec()))
}

fn floats_payload(values: &[f32]) -> Option<Cow<'static, [u8]>> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    Some(Cow::Owned(bytes))
}

/// 4x4 matrix argument: 16 floats, serialized as f32 regardless of the
/// source precision. Missing elements read as zero.
fn matrix_payload(values: &[Value]) -> Option<Cow<'static, [u8]>> {
    let mut bytes = Vec::with_capacity(16 * 4);
    for n in 0..16 {
        let v = values.get(n).map_or(0.0, |v| v.as_float()) as f32;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    Some(Cow::Owned(bytes))
}

fn first_pointer(value: &Value) -> u64 {
    value
        .as_array()
        .and_then(|values| values.first())
        .map_or(0, |v| v.as_pointer())
}

/// Classifies decoded calls into [`SortOp`]s.
///
/// Carries the two process-wide "last bound" handles: `glBufferData` and
/// `glTexSubImage2D` name only a binding point, so the upload is attributed
/// to whatever `glBindBuffer`/`glBindTexture` bound last.
#[derive(Debug, Default)]
pub struct Classifier {
    last_vbo: u64,
    last_tex: u64,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one call, handing each derived op to `sink`.
    pub fn classify<'a>(&mut self, call: &'a Call, mut sink: impl FnMut(SortOp<'a>)) {
        use ChangeKind::{Create, Switch, Update};

        match call.name() {
            // --- OpenGL ---
            "wglSwapBuffers" => {
                sink(SortOp::new(Switch, "SwapBuffers", 100, Slot::Present));
            }
            "glDrawArrays" => {
                sink(SortOp {
                    size: call.arg(2).as_sint() as i32,
                    ..SortOp::new(Switch, "DrawArrays", 101, Slot::Draw)
                });
            }
            "glDrawElements" => {
                // Inline index data rides along as a blob; otherwise the
                // draw pulls from the bound index buffer.
                if let Some(blob) = call.arg(3).as_blob() {
                    sink(SortOp {
                        payload: Some(Cow::Borrowed(blob)),
                        size: blob.len() as i32,
                        ..SortOp::new(Create, "DrawElem", 102, Slot::Draw)
                    });
                } else {
                    sink(SortOp {
                        size: call.arg(1).as_sint() as i32,
                        ..SortOp::new(Switch, "DrawElem", 102, Slot::Draw)
                    });
                }
            }
            "glGenBuffers" | "glGenBuffersARB" => {
                if let Some(values) = call.arg(1).as_array() {
                    for v in values {
                        let handle = v.as_uint();
                        sink(SortOp {
                            object: handle,
                            data: handle,
                            ..SortOp::new(Create, "GenBuffers", 104, Slot::Unknown)
                        });
                    }
                }
            }
            "glBindBuffer" => {
                let target = call.arg(0).as_sint();
                let handle = call.arg(1).as_uint();
                self.last_vbo = handle;
                let bin = match target {
                    gl::ARRAY_BUFFER => Some(Bin::Vertex0),
                    gl::ELEMENT_ARRAY_BUFFER => Some(Bin::Index),
                    _ => None,
                };
                if let Some(bin) = bin {
                    sink(SortOp {
                        object: handle,
                        data: handle,
                        ..SortOp::new(Switch, "BindBuffer", 105, Slot::Bin(bin))
                    });
                }
            }
            "glBufferData" if self.last_vbo != 0 => {
                let target = call.arg(0).as_sint();
                let bin = match target {
                    gl::ARRAY_BUFFER => Some(Bin::Vertex0),
                    gl::ELEMENT_ARRAY_BUFFER => Some(Bin::Index),
                    _ => None,
                };
                if let Some(bin) = bin {
                    sink(SortOp {
                        object: self.last_vbo,
                        data: self.last_vbo,
                        payload: call.arg(2).as_blob().map(Cow::Borrowed),
                        size: call.arg(1).as_sint() as i32,
                        ..SortOp::new(Update, "BufferData", 106, Slot::Bin(bin))
                    });
                }
            }
            "glCreateShader" => {
                let handle = call.ret().as_uint() + SHADER_HANDLE_BIAS;
                sink(SortOp {
                    object: handle,
                    data: handle,
                    payload: handle_payload(handle),
                    size: 8,
                    ..SortOp::new(Create, "CreateShader", 107, Slot::Bin(Bin::Shader))
                });
            }
            "glCreateProgram" => {
                let handle = call.ret().as_uint() + SHADER_HANDLE_BIAS;
                sink(SortOp {
                    object: handle,
                    data: handle,
                    payload: handle_payload(handle),
                    size: 8,
                    ..SortOp::new(Create, "CreateProgram", 108, Slot::Bin(Bin::Shader))
                });
            }
            "glUseProgram" => {
                let handle = call.arg(0).as_uint() + SHADER_HANDLE_BIAS;
                sink(SortOp {
                    object: handle,
                    data: handle,
                    ..SortOp::new(Switch, "UseProgram", 109, Slot::Bin(Bin::Shader))
                });
            }
            "glGenTextures" | "glGenTexturesEXT" => {
                if let Some(values) = call.arg(1).as_array() {
                    for v in values {
                        let handle = v.as_uint() + TEXTURE_HANDLE_BIAS;
                        sink(SortOp {
                            object: handle,
                            data: handle,
                            ..SortOp::new(Create, "GenTextures", 110, Slot::Bin(Bin::Texture))
                        });
                    }
                }
            }
            "glBindTexture" => {
                let handle = call.arg(1).as_uint() + TEXTURE_HANDLE_BIAS;
                self.last_tex = handle;
                sink(SortOp {
                    object: handle,
                    data: handle,
                    ..SortOp::new(Switch, "BindTexture", 111, Slot::Bin(Bin::Texture))
                });
            }
            "glTexSubImage2D" if self.last_tex != 0 => {
                let mut size = call.arg(4).as_sint() * call.arg(5).as_sint();
                size *= match call.arg(6).as_sint() {
                    gl::RGB | gl::BGR => 3,
                    gl::RGBA | gl::BGRA => 4,
                    _ => 1,
                };
                size *= match call.arg(7).as_sint() {
                    gl::UNSIGNED_SHORT => 2,
                    gl::UNSIGNED_INT | gl::INT | gl::FLOAT => 4,
                    _ => 1,
                };
                sink(SortOp {
                    object: self.last_tex,
                    data: self.last_tex,
                    payload: call.arg(8).as_blob().map(Cow::Borrowed),
                    size: size as i32,
                    ..SortOp::new(Update, "TexSubImage2D", 112, Slot::Bin(Bin::Texture))
                });
            }
            "glGetUniformLocation" => {
                let handle = call.ret().as_sint() as u64;
                sink(SortOp {
                    object: handle,
                    data: handle,
                    ..SortOp::new(Create, "GetUniformLocation", 113, Slot::Unknown)
                });
            }
            "glUniform1f" => {
                let location = call.arg(0).as_sint() as u64;
                sink(SortOp {
                    object: location,
                    data: location,
                    payload: floats_payload(&[call.arg(1).as_float() as f32]),
                    size: 4,
                    ..SortOp::new(Update, "Uniform1f", 114, Slot::Bin(Bin::VsConst0))
                });
            }
            "glUniform3f" => {
                let location = call.arg(0).as_sint() as u64;
                let values = [
                    call.arg(1).as_float() as f32,
                    call.arg(2).as_float() as f32,
                    call.arg(3).as_float() as f32,
                ];
                sink(SortOp {
                    object: location,
                    data: location,
                    payload: floats_payload(&values),
                    size: 12,
                    ..SortOp::new(Update, "Uniform3f", 115, Slot::Bin(Bin::VsConst0))
                });
            }
            "glUniform4f" => {
                let location = call.arg(0).as_sint() as u64;
                let values = [
                    call.arg(1).as_float() as f32,
                    call.arg(2).as_float() as f32,
                    call.arg(3).as_float() as f32,
                    call.arg(4).as_float() as f32,
                ];
                sink(SortOp {
                    object: location,
                    data: location,
                    payload: floats_payload(&values),
                    size: 16,
                    ..SortOp::new(Update, "Uniform4f", 116, Slot::Bin(Bin::VsConst0))
                });
            }
            "glUniformMatrix4fv" => {
                let location = call.arg(0).as_sint() as u64;
                if let Some(values) = call.arg(3).as_array() {
                    sink(SortOp {
                        object: location,
                        data: location,
                        payload: matrix_payload(values),
                        size: 64,
                        ..SortOp::new(Update, "UniformMatrix4fv", 117, Slot::Bin(Bin::VsConst1))
                    });
                }
            }
            "glShaderSource" => {
                let handle = call.arg(0).as_uint() + SHADER_HANDLE_BIAS;
                if let Some(sources) = call.arg(2).as_array() {
                    let mut bytes = Vec::new();
                    for source in sources {
                        if let Some(s) = source.as_str() {
                            bytes.extend_from_slice(s.as_bytes());
                            bytes.push(0);
                        }
                    }
                    sink(SortOp {
                        object: handle,
                        data: handle,
                        size: bytes.len() as i32,
                        payload: Some(Cow::Owned(bytes)),
                        ..SortOp::new(Update, "ShaderSource", 118, Slot::Bin(Bin::Shader))
                    });
                }
            }
            "glVertexPointer" => {
                sink_pointer_op(call.arg(3), "VertPointer", 119, Bin::Vertex0, &mut sink);
            }
            "glNormalPointer" => {
                sink_pointer_op(call.arg(2), "NormPointer", 120, Bin::Vertex1, &mut sink);
            }
            "glLoadMatrixd" => {
                if let Some(values) = call.arg(0).as_array() {
                    sink(SortOp {
                        payload: matrix_payload(values),
                        size: 64,
                        ..SortOp::new(Update, "LoadMatrixd", 121, Slot::Bin(Bin::PsConst4))
                    });
                }
            }
            "glLoadMatrixf" => {
                if let Some(values) = call.arg(0).as_array() {
                    sink(SortOp {
                        payload: matrix_payload(values),
                        size: 64,
                        ..SortOp::new(Update, "LoadMatrixf", 122, Slot::Bin(Bin::PsConst4))
                    });
                }
            }

            // --- Direct3D 10/11 ---
            "IDXGISwapChain::Present" => {
                sink(SortOp::new(Switch, "Present", 0, Slot::Present));
            }
            "ID3D10Device::DrawIndexed" | "ID3D11DeviceContext::DrawIndexed" => {
                sink(SortOp {
                    size: call.arg(1).as_uint() as i32,
                    ..SortOp::new(Switch, "DrawIdx", 1, Slot::Draw)
                });
            }
            "ID3D10Device::DrawInstanced" | "ID3D11DeviceContext::DrawInstanced" => {
                sink(SortOp {
                    size: (call.arg(1).as_uint() * call.arg(2).as_uint()) as i32,
                    ..SortOp::new(Switch, "DrawIst", 2, Slot::Draw)
                });
            }
            "ID3D10Device::Draw" | "ID3D11DeviceContext::Draw" => {
                sink(SortOp {
                    size: call.arg(1).as_uint() as i32,
                    ..SortOp::new(Switch, "Draw", 3, Slot::Draw)
                });
            }
            "ID3D10Device::CreateBuffer" | "ID3D11Device::CreateBuffer" => {
                if let Some(values) = call.arg(3).as_array() {
                    for v in values {
                        let handle = v.as_pointer();
                        sink(SortOp {
                            object: handle,
                            data: handle,
                            ..SortOp::new(Create, "CreateBuffer", 4, Slot::Unknown)
                        });
                    }
                }
            }
            "ID3D10Device::CreateRenderTargetView" | "ID3D11Device::CreateRenderTargetView" => {
                let handle = first_pointer(call.arg(3));
                sink(SortOp {
                    object: handle,
                    data: handle,
                    payload: handle_payload(handle),
                    size: 8,
                    ..SortOp::new(Create, "CreateRenderTargetView", 5, Slot::Bin(Bin::RenderTarget))
                });
            }
            "ID3D10Device::OMSetRenderTargets" | "ID3D11DeviceContext::OMSetRenderTargets" => {
                if let Some(values) = call.arg(2).as_array() {
                    for v in values {
                        let handle = v.as_pointer();
                        sink(SortOp {
                            object: handle,
                            data: handle,
                            payload: handle_payload(handle),
                            size: 8,
                            ..SortOp::new(Switch, "OMSetRenderTargets", 6, Slot::Bin(Bin::RenderTarget))
                        });
                    }
                }
            }
            "ID3D10Device::CreateRasterizerState" | "ID3D11Device::CreateRasterizerState" => {
                let handle = first_pointer(call.arg(2));
                sink(SortOp {
                    object: handle,
                    data: handle,
                    payload: handle_payload(handle),
                    size: 8,
                    ..SortOp::new(Create, "CreateRasterizerState", 7, Slot::Bin(Bin::Rasterizer))
                });
            }
            "ID3D10Device::RSSetState" | "ID3D11DeviceContext::RSSetState" => {
                let handle = call.arg(1).as_pointer();
                sink(SortOp {
                    object: handle,
                    data: handle,
                    payload: handle_payload(handle),
                    size: 8,
                    ..SortOp::new(Switch, "RSSetState", 8, Slot::Bin(Bin::Rasterizer))
                });
            }
            // The D3D10 and D3D11 device interfaces place the out-handle at
            // different argument positions (3 vs 4).
            "ID3D10Device::CreateVertexShader" | "ID3D10Device1::CreateVertexShader" => {
                sink_shader_create(first_pointer(call.arg(3)), "CreateVertexShader", 9, &mut sink);
            }
            "ID3D11Device::CreateVertexShader" => {
                sink_shader_create(first_pointer(call.arg(4)), "CreateVertexShader", 10, &mut sink);
            }
            "ID3D10Device::CreatePixelShader" | "ID3D10Device1::CreatePixelShader" => {
                sink_shader_create(first_pointer(call.arg(3)), "CreatePixelShader", 11, &mut sink);
            }
            "ID3D11Device::CreatePixelShader" => {
                sink_shader_create(first_pointer(call.arg(4)), "CreatePixelShader", 12, &mut sink);
            }
            "ID3D10Device::VSSetShader" | "ID3D11DeviceContext::VSSetShader" => {
                let handle = call.arg(1).as_pointer();
                sink(SortOp {
                    object: handle,
                    data: handle,
                    ..SortOp::new(Switch, "VSSetShader", 13, Slot::Bin(Bin::Shader))
                });
            }
            "ID3D10Device::PSSetShader" | "ID3D11DeviceContext::PSSetShader" => {
                let handle = call.arg(1).as_pointer();
                sink(SortOp {
                    object: handle,
                    data: handle,
                    ..SortOp::new(Switch, "PSSetShader", 14, Slot::Bin(Bin::Shader))
                });
            }
            // Map carries no data at map time; the upload through the mapped
            // range is not modelled, so the byte volume is undercounted.
            "ID3D10Buffer::Map" => {
                sink(SortOp {
                    object: first_pointer(call.arg(3)),
                    ..SortOp::new(Update, "Map", 15, Slot::Unknown)
                });
            }
            "ID3D11DeviceContext::Map" => {
                sink(SortOp {
                    object: call.arg(1).as_pointer(),
                    ..SortOp::new(Update, "Map", 15, Slot::Unknown)
                });
            }
            "ID3D10Device::UpdateSubresource" | "ID3D11DeviceContext::UpdateSubresource" => {
                let handle = call.arg(1).as_pointer();
                let blob = call.arg(4).as_blob();
                sink(SortOp {
                    object: handle,
                    data: handle,
                    size: blob.map_or(0, |b| b.len() as i32),
                    payload: blob.map(Cow::Borrowed),
                    ..SortOp::new(Update, "UpdateSubresource", 16, Slot::Unknown)
                });
            }
            "ID3D10Device::IASetVertexBuffers" | "ID3D11DeviceContext::IASetVertexBuffers" => {
                sink_multi_slot(call, "IASetVertexBuffers", 17, Bin::vertex_slot, &mut sink);
            }
            "ID3D10Device::IASetIndexBuffer" | "ID3D11DeviceContext::IASetIndexBuffer" => {
                let handle = call.arg(1).as_pointer();
                sink(SortOp {
                    object: handle,
                    data: handle,
                    ..SortOp::new(Switch, "IASetIndexBuffer", 18, Slot::Bin(Bin::Index))
                });
            }
            "ID3D10Device::VSSetConstantBuffers" | "ID3D11DeviceContext::VSSetConstantBuffers" => {
                sink_multi_slot(call, "VSSetConstantBuffers", 19, Bin::vs_const_slot, &mut sink);
            }
            "ID3D10Device::PSSetConstantBuffers" | "ID3D11DeviceContext::PSSetConstantBuffers" => {
                sink_multi_slot(call, "PSSetConstantBuffers", 20, Bin::ps_const_slot, &mut sink);
            }
            _ => {}
        }
    }
}

/// Client-array pointer calls: an inline blob is an upload, a plain pointer
/// is a bind to an external buffer, and a null pointer disables the array.
fn sink_pointer_op<'a>(
    value: &'a Value,
    name: &'static str,
    name_id: u8,
    bin: Bin,
    sink: &mut impl FnMut(SortOp<'a>),
) {
    if let Some(blob) = value.as_blob() {
        sink(SortOp {
            payload: Some(Cow::Borrowed(blob)),
            size: blob.len() as i32,
            ..SortOp::new(ChangeKind::Update, name, name_id, Slot::Bin(bin))
        });
    } else {
        let pointer = value.as_pointer();
        if pointer != 0 {
            sink(SortOp {
                object: pointer,
                data: pointer,
                ..SortOp::new(ChangeKind::Switch, name, name_id, Slot::Bin(bin))
            });
        }
    }
}

fn sink_shader_create<'a>(
    handle: u64,
    name: &'static str,
    name_id: u8,
    sink: &mut impl FnMut(SortOp<'a>),
) {
    sink(SortOp {
        object: handle,
        data: handle,
        payload: handle_payload(handle),
        size: 8,
        ..SortOp::new(ChangeKind::Create, name, name_id, Slot::Bin(Bin::Shader))
    });
}

/// `(this, start_slot, count, handles[])` bind calls: fan out one switch per
/// handle onto consecutive slots, clamped to the modelled slot count.
fn sink_multi_slot<'a>(
    call: &'a Call,
    name: &'static str,
    name_id: u8,
    slot_for: fn(usize) -> Bin,
    sink: &mut impl FnMut(SortOp<'a>),
) {
    let requested = call.arg(2).as_uint() as usize;
    if requested > MAX_FANOUT_SLOTS {
        warn!(call = name, requested, "bind touches more slots than modelled, clamping");
    }
    let count = requested.min(MAX_FANOUT_SLOTS);
    let Some(values) = call.arg(3).as_array() else {
        return;
    };
    for (n, v) in values.iter().take(count).enumerate() {
        let handle = v.as_pointer();
        sink(SortOp {
            object: handle,
            data: handle,
            ..SortOp::new(ChangeKind::Switch, name, name_id, Slot::Bin(slot_for(n)))
        });
    }
}
