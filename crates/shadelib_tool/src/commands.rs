// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tool subcommands.

use clap::{Parser, Subcommand};
use shadelib_network::settings::SETTINGS_FILE_NAME;
use shadelib_network::{
    LibrarySettings, NetworkError, SettingsError, ShaderLibrary, ShadingNetwork,
};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Command line of the `shadelib` tool
#[derive(Debug, Parser)]
#[command(name = "shadelib", version)]
#[command(about = "Inspect and maintain shader library folders")]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Tool subcommands
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List the shaders stored in a library folder
    List {
        /// Library folder
        library_dir: PathBuf,
    },
    /// Print the nodes of a shading network file
    Inspect {
        /// Network file
        file: PathBuf,
    },
    /// Check that network files are well formed and closed
    Validate {
        /// Network files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write default library settings (file or folder)
    InitSettings {
        /// Settings file, or the folder to write it into
        path: PathBuf,
    },
}

/// Tool failure
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Network file or library failure
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Settings failure
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Some files did not validate
    #[error("{failed} of {total} files failed validation")]
    Invalid {
        /// Failed files
        failed: usize,
        /// Checked files
        total: usize,
    },

    /// Could not write output
    #[error("Output error: {0}")]
    Output(#[from] std::io::Error),
}

impl Command {
    /// Run the command, printing to `out`
    pub fn run(&self, out: &mut impl Write) -> Result<(), ToolError> {
        match self {
            Self::List { library_dir } => list(library_dir, out),
            Self::Inspect { file } => inspect(file, out),
            Self::Validate { files } => validate(files, out),
            Self::InitSettings { path } => init_settings(path, out),
        }
    }
}

/// Open a library folder, honouring its settings file when present
fn open_library(dir: &Path) -> Result<ShaderLibrary, ToolError> {
    let settings_path = LibrarySettings::settings_file_path(dir);
    if settings_path.is_file() {
        let mut library = ShaderLibrary::open(&settings_path)?;
        if library.root().is_relative() {
            let mut settings = library.settings().clone();
            settings.library_root = dir.join(&settings.library_root);
            library = ShaderLibrary::new(settings);
        }
        Ok(library)
    } else {
        Ok(ShaderLibrary::new(LibrarySettings::new(dir)))
    }
}

fn list(dir: &Path, out: &mut impl Write) -> Result<(), ToolError> {
    let library = open_library(dir)?;
    let entries = library.entries()?;
    for entry in &entries {
        writeln!(out, "{}\t{}", entry.name, entry.file_path.display())?;
    }
    tracing::info!("{} shaders in {:?}", entries.len(), library.root());
    Ok(())
}

fn inspect(path: &Path, out: &mut impl Write) -> Result<(), ToolError> {
    let network = ShadingNetwork::read(path)?;
    writeln!(out, "root: {}", network.root().unwrap_or("<none>"))?;
    writeln!(out, "nodes: {}", network.len())?;
    for record in network.records() {
        writeln!(
            out,
            "  {} [{} {}] {} attributes, {} connections",
            record.name,
            record.node_kind,
            record.object_type,
            record.attributes.len(),
            record.connections.len()
        )?;
        for (attribute, connection) in &record.connections {
            writeln!(out, "    {attribute} <- {connection}")?;
        }
    }
    if let Some(thumbnail) = network.thumbnail() {
        writeln!(out, "thumbnail: {} bytes (base64)", thumbnail.as_base64().len())?;
    }
    Ok(())
}

fn validate(paths: &[PathBuf], out: &mut impl Write) -> Result<(), ToolError> {
    let mut failed = 0;
    for path in paths {
        match ShadingNetwork::read(path) {
            Ok(network) => {
                let dangling = network.dangling_connections();
                if dangling.is_empty() {
                    writeln!(out, "ok      {}", path.display())?;
                } else {
                    failed += 1;
                    writeln!(out, "open    {}", path.display())?;
                    for (node, attribute, connection) in dangling {
                        writeln!(out, "    {node}.{attribute} <- {connection} (missing)")?;
                    }
                }
            }
            Err(e) => {
                failed += 1;
                tracing::debug!("Validation of {:?} failed: {}", path, e);
                writeln!(out, "invalid {}: {e}", path.display())?;
            }
        }
    }

    if failed > 0 {
        return Err(ToolError::Invalid {
            failed,
            total: paths.len(),
        });
    }
    Ok(())
}

fn init_settings(path: &Path, out: &mut impl Write) -> Result<(), ToolError> {
    let target = if path.is_dir() {
        LibrarySettings::settings_file_path(path)
    } else {
        path.to_path_buf()
    };
    LibrarySettings::default().save(&target)?;
    tracing::info!("Wrote default {} to {:?}", SETTINGS_FILE_NAME, target);
    writeln!(out, "{}", target.display())?;
    Ok(())
}
