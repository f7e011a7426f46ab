// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Host build toolchains for generated code

use genn_model::{GennError, Result};
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Whether a backend's generated code needs a host compile step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainKind {
    /// Build with the host toolchain (`make` or `msbuild`)
    Host,
    /// The runtime consumes the generated artifact directly
    InProcess,
}

/// Builds the generated code directory into a loadable artifact
pub trait Toolchain {
    fn name(&self) -> &str;

    /// Command that builds the generated code in `path`
    fn command(&self, path: &Path) -> Command;

    fn build(&self, path: &Path) -> Result<()> {
        let mut command = self.command(path);
        info!(target: "genn_backend", "Building generated code with {}", self.name());
        debug!(target: "genn_backend", "{:?}", command);

        let status = command
            .status()
            .map_err(|e| GennError::external_tool(self.name(), e.to_string()))?;
        if !status.success() {
            return Err(GennError::external_tool(
                self.name(),
                format!("exited with {} in {}", status, path.display()),
            ));
        }
        Ok(())
    }
}

/// Recursive parallel makefile build
#[derive(Debug, Clone)]
pub struct MakeToolchain {
    pub jobs: usize,
}

impl MakeToolchain {
    /// Parallelism defaults to the number of physical cores
    pub fn new(jobs: Option<usize>) -> Self {
        Self {
            jobs: jobs.unwrap_or_else(num_cpus::get_physical).max(1),
        }
    }
}

impl Toolchain for MakeToolchain {
    fn name(&self) -> &str {
        "make"
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new("make");
        command.arg("-j").arg(self.jobs.to_string()).arg("-C").arg(path);
        command
    }
}

/// Project-file build used on Windows hosts
#[derive(Debug, Clone)]
pub struct MsBuildToolchain {
    pub configuration: String,
}

impl Default for MsBuildToolchain {
    fn default() -> Self {
        Self {
            configuration: "Release".to_string(),
        }
    }
}

impl Toolchain for MsBuildToolchain {
    fn name(&self) -> &str {
        "msbuild"
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new("msbuild");
        command
            .arg(format!("/p:Configuration={}", self.configuration))
            .arg("/m")
            .arg("/verbosity:minimal")
            .arg("runner.vcxproj")
            .current_dir(path);
        command
    }
}

/// Toolchain for the current host OS
pub fn host_toolchain(jobs: Option<usize>, msbuild_configuration: Option<&str>) -> Box<dyn Toolchain> {
    if cfg!(windows) {
        let mut msbuild = MsBuildToolchain::default();
        if let Some(configuration) = msbuild_configuration {
            msbuild.configuration = configuration.to_string();
        }
        Box::new(msbuild)
    } else {
        Box::new(MakeToolchain::new(jobs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_make_uses_jobs_and_directory() {
        let make = MakeToolchain::new(Some(6));
        let command = make.command(Path::new("/tmp/model_CODE"));
        assert_eq!(command.get_program(), "make");
        assert_eq!(args(&command), vec!["-j", "6", "-C", "/tmp/model_CODE"]);
    }

    #[test]
    fn test_make_defaults_to_physical_cores() {
        assert_eq!(MakeToolchain::new(None).jobs, num_cpus::get_physical().max(1));
    }

    #[test]
    fn test_msbuild_release_project() {
        let command = MsBuildToolchain::default().command(Path::new("C:/model_CODE"));
        assert_eq!(
            args(&command),
            vec![
                "/p:Configuration=Release",
                "/m",
                "/verbosity:minimal",
                "runner.vcxproj"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_build_is_external_tool_error() {
        struct Failing;
        impl Toolchain for Failing {
            fn name(&self) -> &str {
                "false"
            }
            fn command(&self, _path: &Path) -> Command {
                Command::new("false")
            }
        }

        let err = Failing.build(Path::new(".")).unwrap_err();
        assert!(matches!(err, GennError::ExternalTool { .. }));
    }
}
