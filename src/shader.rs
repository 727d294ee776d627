// ============================================================================
// shader.rs — shader-fluid
// Declared uniform surfaces of the simulation programs and the CPU mirror of
// each program's uniform block.
// ============================================================================

use bytemuck::bytes_of;

use crate::error::SimError;

// ======================== Uniform Values ========================

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Int,
    Float,
    Vec2,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
        }
    }

    fn bytes(&self) -> &[u8] {
        match self {
            UniformValue::Int(v) => bytes_of(v),
            UniformValue::Float(v) => bytes_of(v),
            UniformValue::Vec2(v) => bytes_of(v),
        }
    }
}

/// One named member of a program's uniform block.
#[derive(Copy, Clone, Debug)]
pub struct UniformField {
    pub name: &'static str,
    pub kind: UniformKind,
    /// Byte offset inside the WGSL uniform struct.
    pub offset: usize,
}

/// A resolved uniform location. Obtained once from [`ProgramDesc::locate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UniformSlot(usize);

// ======================== Program Descriptors ========================

/// Static description of a fragment program: WGSL source plus the names the
/// host may address. [`ProgramDesc::verify`] holds the table to the source.
#[derive(Debug)]
pub struct ProgramDesc {
    pub name: &'static str,
    pub source: &'static str,
    pub uniforms: &'static [UniformField],
    /// Extra texture inputs, bound at groups 1.. in declaration order.
    pub textures: &'static [&'static str],
    pub block_size: usize,
}

impl ProgramDesc {
    pub fn locate(&self, name: &str) -> Result<UniformSlot, SimError> {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .map(UniformSlot)
            .ok_or_else(|| SimError::MissingUniform {
                program: self.name,
                name: name.to_string(),
            })
    }

    pub fn texture_index(&self, name: &str) -> Result<usize, SimError> {
        self.textures
            .iter()
            .position(|t| *t == name)
            .ok_or_else(|| SimError::MissingTexture {
                program: self.name,
                name: name.to_string(),
            })
    }

    pub fn field(&self, slot: UniformSlot) -> &UniformField {
        &self.uniforms[slot.0]
    }

    /// Checks every declared uniform and texture input against the WGSL that
    /// will actually run: names, value kinds, byte offsets and block size.
    pub fn verify(&self) -> Result<(), SimError> {
        self.verify_source(self.source)
    }

    fn verify_source(&self, source: &str) -> Result<(), SimError> {
        let program = self.name;
        let module = naga::front::wgsl::parse_str(source).map_err(|err| SimError::Shader {
            program,
            message: err.emit_to_string(source),
        })?;

        let block = module
            .global_variables
            .iter()
            .find_map(|(_, var)| {
                let binding = var.binding.as_ref()?;
                (var.space == naga::AddressSpace::Uniform
                    && binding.group == 0
                    && binding.binding == 0)
                    .then_some(var.ty)
            })
            .ok_or_else(|| SimError::Shader {
                program,
                message: "no uniform block at group 0, binding 0".to_string(),
            })?;

        let naga::TypeInner::Struct { members, span } = &module.types[block].inner else {
            return Err(SimError::Shader {
                program,
                message: "uniform block is not a struct".to_string(),
            });
        };
        if *span as usize != self.block_size {
            return Err(SimError::Shader {
                program,
                message: format!(
                    "uniform block is {span} bytes, host expects {}",
                    self.block_size
                ),
            });
        }

        for field in self.uniforms {
            let member = members
                .iter()
                .find(|m| m.name.as_deref() == Some(field.name))
                .ok_or_else(|| SimError::MissingUniform {
                    program,
                    name: field.name.to_string(),
                })?;
            if wgsl_kind(&module.types[member.ty].inner) != Some(field.kind) {
                return Err(SimError::UniformType {
                    program,
                    name: field.name,
                });
            }
            if member.offset as usize != field.offset {
                return Err(SimError::UniformOffset {
                    program,
                    name: field.name,
                    declared: field.offset,
                    actual: member.offset as usize,
                });
            }
        }

        // Extra texture inputs sit alone in groups 1.. in declaration order.
        for (i, name) in self.textures.iter().enumerate() {
            let group = 1 + i as u32;
            let bound = module.global_variables.iter().any(|(_, var)| {
                var.name.as_deref() == Some(*name)
                    && var
                        .binding
                        .as_ref()
                        .is_some_and(|b| b.group == group && b.binding == 0)
            });
            if !bound {
                return Err(SimError::MissingTexture {
                    program,
                    name: name.to_string(),
                });
            }
        }

        Ok(())
    }
}

fn wgsl_kind(inner: &naga::TypeInner) -> Option<UniformKind> {
    match *inner {
        naga::TypeInner::Scalar(s) if s == naga::Scalar::I32 => Some(UniformKind::Int),
        naga::TypeInner::Scalar(s) if s == naga::Scalar::F32 => Some(UniformKind::Float),
        naga::TypeInner::Vector {
            size: naga::VectorSize::Bi,
            scalar,
        } if scalar == naga::Scalar::F32 => Some(UniformKind::Vec2),
        _ => None,
    }
}

const fn field(name: &'static str, kind: UniformKind, offset: usize) -> UniformField {
    UniformField { name, kind, offset }
}

pub static DIFFUSE: ProgramDesc = ProgramDesc {
    name: "diffuse",
    source: include_str!("shaders/diffuse.wgsl"),
    uniforms: &[
        field("resolution", UniformKind::Vec2, 0),
        field("gridSize", UniformKind::Int, 8),
        field("dt", UniformKind::Float, 12),
        field("diff", UniformKind::Float, 16),
        field("paused", UniformKind::Int, 20),
        field("sourceRadius", UniformKind::Float, 24),
        field("sourceStrength", UniformKind::Float, 28),
    ],
    textures: &[],
    block_size: 32,
};

pub static ADVECT: ProgramDesc = ProgramDesc {
    name: "advect",
    source: include_str!("shaders/advect.wgsl"),
    uniforms: &[
        field("resolution", UniformKind::Vec2, 0),
        field("gridSize", UniformKind::Int, 8),
        field("dt", UniformKind::Float, 12),
        field("diff", UniformKind::Float, 16),
        field("paused", UniformKind::Int, 20),
        field("velocityRange", UniformKind::Float, 24),
    ],
    textures: &["uVelBuffer", "vVelBuffer"],
    block_size: 32,
};

// ======================== Uniform Block ========================

/// Host copy of a program's uniform buffer contents.
#[derive(Clone, Debug)]
pub struct UniformBlock {
    desc: &'static ProgramDesc,
    bytes: Vec<u8>,
}

impl UniformBlock {
    pub fn new(desc: &'static ProgramDesc) -> Self {
        Self {
            desc,
            bytes: vec![0; desc.block_size],
        }
    }

    pub fn set(&mut self, slot: UniformSlot, value: UniformValue) -> Result<(), SimError> {
        let field = self.desc.field(slot);
        if field.kind != value.kind() {
            return Err(SimError::UniformType {
                program: self.desc.name,
                name: field.name,
            });
        }
        let src = value.bytes();
        self.bytes[field.offset..field.offset + src.len()].copy_from_slice(src);
        Ok(())
    }

    #[cfg(test)]
    pub fn get(&self, slot: UniformSlot) -> UniformValue {
        let field = self.desc.field(slot);
        let at = |i: usize| -> [u8; 4] {
            let o = field.offset + i * 4;
            [self.bytes[o], self.bytes[o + 1], self.bytes[o + 2], self.bytes[o + 3]]
        };
        match field.kind {
            UniformKind::Int => UniformValue::Int(i32::from_le_bytes(at(0))),
            UniformKind::Float => UniformValue::Float(f32::from_le_bytes(at(0))),
            UniformKind::Vec2 => {
                UniformValue::Vec2([f32::from_le_bytes(at(0)), f32::from_le_bytes(at(1))])
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A GPU program handle as seen by the simulation: something with a declared
/// uniform surface. Execution goes through the backend.
pub trait ShaderProgram {
    fn desc(&self) -> &'static ProgramDesc;

    fn locate(&self, name: &str) -> Result<UniformSlot, SimError> {
        self.desc().locate(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_declared_uniforms() {
        for name in ["resolution", "gridSize", "dt", "diff", "paused"] {
            assert!(DIFFUSE.locate(name).is_ok(), "diffuse lacks {name}");
            assert!(ADVECT.locate(name).is_ok(), "advect lacks {name}");
        }
        assert!(DIFFUSE.locate("sourceRadius").is_ok());
        assert!(ADVECT.locate("velocityRange").is_ok());
        assert_eq!(ADVECT.texture_index("vVelBuffer").unwrap(), 1);
    }

    #[test]
    fn missing_names_are_errors() {
        let err = DIFFUSE.locate("velocityRange").unwrap_err();
        assert!(matches!(err, SimError::MissingUniform { program: "diffuse", .. }));
        assert!(DIFFUSE.texture_index("uVelBuffer").is_err());
    }

    #[test]
    fn declared_surfaces_match_wgsl() {
        DIFFUSE.verify().unwrap();
        ADVECT.verify().unwrap();
    }

    #[test]
    fn reordered_wgsl_members_are_rejected() {
        let swapped = DIFFUSE
            .source
            .replace("    dt: f32,\n    diff: f32,", "    diff: f32,\n    dt: f32,");
        assert_ne!(swapped, DIFFUSE.source);
        let err = DIFFUSE.verify_source(&swapped).unwrap_err();
        assert!(matches!(
            err,
            SimError::UniformOffset {
                name: "dt",
                declared: 12,
                actual: 16,
                ..
            }
        ));
    }

    #[test]
    fn renamed_wgsl_member_is_missing() {
        let renamed = DIFFUSE.source.replace("sourceStrength", "source_strength");
        let err = DIFFUSE.verify_source(&renamed).unwrap_err();
        assert!(matches!(
            err,
            SimError::MissingUniform { program: "diffuse", ref name } if name == "sourceStrength"
        ));
    }

    #[test]
    fn retyped_wgsl_member_is_rejected() {
        let retyped = DIFFUSE.source.replace("gridSize: i32", "gridSize: u32");
        assert_ne!(retyped, DIFFUSE.source);
        let err = DIFFUSE.verify_source(&retyped).unwrap_err();
        assert!(matches!(err, SimError::UniformType { name: "gridSize", .. }));
    }

    #[test]
    fn unbound_texture_input_is_rejected() {
        let renamed = ADVECT.source.replace("vVelBuffer", "v_vel");
        let err = ADVECT.verify_source(&renamed).unwrap_err();
        assert!(matches!(err, SimError::MissingTexture { program: "advect", .. }));
    }

    #[test]
    fn invalid_wgsl_is_reported() {
        let err = DIFFUSE.verify_source("struct Broken {").unwrap_err();
        assert!(matches!(err, SimError::Shader { program: "diffuse", .. }));
    }

    #[test]
    fn fields_fit_inside_block() {
        for desc in [&DIFFUSE, &ADVECT] {
            for f in desc.uniforms {
                let len = if f.kind == UniformKind::Vec2 { 8 } else { 4 };
                assert!(f.offset + len <= desc.block_size);
                assert_eq!(f.offset % 4, 0);
            }
        }
    }

    #[test]
    fn block_writes_at_declared_offsets() {
        let mut block = UniformBlock::new(&DIFFUSE);
        let paused = DIFFUSE.locate("paused").unwrap();
        let resolution = DIFFUSE.locate("resolution").unwrap();
        block.set(paused, UniformValue::Int(1)).unwrap();
        block.set(resolution, UniformValue::Vec2([256.0, 128.0])).unwrap();

        assert_eq!(&block.as_bytes()[20..24], &1i32.to_le_bytes());
        assert_eq!(&block.as_bytes()[4..8], &128.0f32.to_le_bytes());
        assert_eq!(block.get(paused), UniformValue::Int(1));
        assert_eq!(block.get(resolution), UniformValue::Vec2([256.0, 128.0]));
    }

    #[test]
    fn block_rejects_wrong_kind() {
        let mut block = UniformBlock::new(&ADVECT);
        let dt = ADVECT.locate("dt").unwrap();
        assert!(block.set(dt, UniformValue::Int(3)).is_err());
    }
}
