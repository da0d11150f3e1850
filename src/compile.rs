//! Compilation pipeline: description text to placed artifacts.
//!
//! Everything is generated in memory before anything touches the disk, so
//! a failing generator never leaves a partial output tree behind.

use std::path::{Path, PathBuf};

use crate::build_id::build_id;
use crate::codegen::{self, Artifact, ArtifactKind};
use crate::error::StatewireError;
use crate::model::{DeviceRole, Model};
use crate::parser::parse_description;
use crate::topology::{resolve_topology, TopologyAssignment, DEFAULT_PRIMARY_UNIT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Deployment name; board directories are `<deployment>UNIT<n>`.
    pub deployment: String,
    /// Write only the primary (no secondaries), surface and console, all
    /// under the output root.
    pub flat: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Relative to the output root.
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone)]
pub struct Compilation {
    pub model: Model,
    pub build_id: u32,
    pub topology: TopologyAssignment,
    pub files: Vec<OutputFile>,
}

/// Parse, validate and generate every artifact for `text`.
pub fn compile(text: &str, options: &CompileOptions) -> Result<Compilation, StatewireError> {
    let model = parse_description(text)?;
    let id = build_id(&model);
    let topology = if options.flat {
        TopologyAssignment {
            primary_unit: DEFAULT_PRIMARY_UNIT,
            secondary_mask: 0,
            secondaries: Vec::new(),
        }
    } else {
        resolve_topology(model.roles())
    };

    let mut artifacts: Vec<Artifact> = if options.flat {
        codegen::check_preconditions(&model)?;
        let primary = codegen::generate_primary(&model, id, &topology)?;
        vec![
            Artifact {
                kind: ArtifactKind::FirmwareHeader(DeviceRole::Primary),
                contents: primary.header,
            },
            Artifact {
                kind: ArtifactKind::FirmwareSource(DeviceRole::Primary),
                contents: primary.source,
            },
            Artifact {
                kind: ArtifactKind::Surface,
                contents: codegen::generate_surface(&model, id)?,
            },
            Artifact {
                kind: ArtifactKind::Console,
                contents: codegen::generate_console(&model, id)?,
            },
        ]
    } else {
        codegen::generate_all(&model, id, &topology)?
    };
    artifacts.push(Artifact {
        kind: ArtifactKind::ConsoleManifest,
        contents: codegen::generate_console_manifest(&options.deployment, id),
    });

    let files = artifacts
        .into_iter()
        .map(|a| OutputFile {
            path: placement(a.kind, &topology, options),
            contents: a.contents,
        })
        .collect();
    Ok(Compilation {
        model,
        build_id: id,
        topology,
        files,
    })
}

fn placement(kind: ArtifactKind, topology: &TopologyAssignment, options: &CompileOptions) -> PathBuf {
    let file = kind.file_name();
    match kind {
        ArtifactKind::Console | ArtifactKind::ConsoleManifest => Path::new("console").join(file),
        ArtifactKind::Surface => PathBuf::from(file),
        ArtifactKind::FirmwareHeader(_) | ArtifactKind::FirmwareSource(_) if options.flat => {
            PathBuf::from(file)
        }
        ArtifactKind::FirmwareHeader(role) | ArtifactKind::FirmwareSource(role) => {
            let unit = topology.unit_of(role).unwrap_or(DEFAULT_PRIMARY_UNIT);
            Path::new(&format!("{}UNIT{unit}", options.deployment)).join(file)
        }
    }
}

/// Write every file of `compilation` under `root`, creating directories.
pub fn write_outputs(compilation: &Compilation, root: &Path) -> Result<Vec<PathBuf>, StatewireError> {
    let mut written = Vec::with_capacity(compilation.files.len());
    for file in &compilation.files {
        let path = root.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &file.contents)?;
        log::info!("wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}
