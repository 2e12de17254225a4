//! Integration tests for Kiln

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn kiln() -> Command {
        let mut cmd = cargo_bin_cmd!("kiln");
        cmd.env("KILN_CONFIG", "/nonexistent/kiln/config.toml");
        cmd
    }

    #[test]
    fn help_displays() {
        kiln()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("signature-gated cache"));
    }

    #[test]
    fn version_displays() {
        kiln()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn config_path() {
        kiln()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        kiln()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[install]"))
            .stdout(predicate::str::contains("kiln-prebuild"));
    }

    #[test]
    fn completions_bash() {
        kiln()
            .args(["completions", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kiln"));
    }

    #[test]
    fn compile_requires_arguments() {
        kiln().arg("compile").assert().failure();
    }
}

mod build_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Shell commands standing in for the real toolchain and package manager
    const LOCAL_CONFIG: &str = r#"
[toolchain]
install_command = "mkdir -p {prefix}/bin"
version_command = "echo v20.11.1; echo 10.2.4"

[install]
fresh_command = "mkdir -p node_modules/left-pad && echo added 1 package"
rebuild_command = "echo rebuilt 1 package"
summary_command = "echo app@1.0.0; echo left-pad@1.3.0"
"#;

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new(manifest: Option<&str>) -> Self {
            let dir = TempDir::new().unwrap();
            for sub in ["project", "cache", "env"] {
                fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            if let Some(manifest) = manifest {
                fs::write(dir.path().join("project/package.json"), manifest).unwrap();
            }
            fs::write(dir.path().join("project/.kiln.toml"), LOCAL_CONFIG).unwrap();
            Self { dir }
        }

        fn path(&self, sub: &str) -> PathBuf {
            self.dir.path().join(sub)
        }

        fn kiln(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("kiln");
            cmd.env("KILN_CONFIG", self.path("global.toml"));
            cmd
        }

        fn compile(&self) -> Command {
            let mut cmd = self.kiln();
            cmd.arg("compile")
                .arg(self.path("project"))
                .arg(self.path("cache"))
                .arg(self.path("env"))
                .arg("--log")
                .arg(self.path("build.log"));
            cmd
        }
    }

    #[test]
    fn detect_with_manifest() {
        let ws = Workspace::new(Some(r#"{"name": "app"}"#));
        ws.kiln()
            .arg("detect")
            .arg(ws.path("project"))
            .assert()
            .success()
            .stdout(predicate::str::contains("Node.js"));
    }

    #[test]
    fn detect_without_manifest() {
        let ws = Workspace::new(None);
        ws.kiln()
            .arg("detect")
            .arg(ws.path("project"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("No package.json"));
    }

    #[test]
    fn compile_without_manifest_is_invalid_input() {
        let ws = Workspace::new(None);
        ws.compile()
            .assert()
            .failure()
            .stdout(predicate::str::contains("Invalid project"))
            .stdout(predicate::str::contains("No package.json found in"))
            .stderr(predicate::str::contains("Error:").not());
        assert!(!ws.path("cache/kiln/signature").exists());
    }

    #[test]
    fn compile_cold_then_warm() {
        let ws = Workspace::new(Some(r#"{"name": "app", "engines": {"node": "20.x"}}"#));

        ws.compile()
            .assert()
            .success()
            .stdout(predicate::str::contains("fresh install"))
            .stdout(predicate::str::contains("Build succeeded"));

        assert!(ws.path("cache/kiln/signature").exists());
        assert!(ws.path("cache/kiln/entries/node_modules/left-pad").exists());
        assert!(ws.path("cache/kiln/metadata.json").exists());
        assert!(ws.path("project/.profile.d/kiln.sh").exists());
        assert!(ws.path("project/.kiln/node/bin").exists());

        let log = fs::read_to_string(ws.path("build.log")).unwrap();
        assert!(log.contains("added 1 package"));

        // node_modules is now part of the tree, as if submitted with the source
        ws.compile()
            .assert()
            .success()
            .stdout(predicate::str::contains("rebuild existing"))
            .stdout(predicate::str::contains("Restored node_modules"))
            .stdout(predicate::str::contains("checked into source control"));

        let log = fs::read_to_string(ws.path("build.log")).unwrap();
        assert!(log.contains("rebuilt 1 package"));
        assert!(!log.contains("added 1 package"));
    }

    #[test]
    fn binary_noise_in_output_does_not_stall() {
        let ws = Workspace::new(Some(
            r#"{"name": "app", "scripts": {"kiln-prebuild": "printf '\\377\\n'; head -c 200000 /dev/zero | tr '\\0' a; echo"}}"#,
        ));

        ws.compile()
            .timeout(std::time::Duration::from_secs(60))
            .assert()
            .success()
            .stdout(predicate::str::contains("Build succeeded"));
    }

    #[test]
    fn failing_hook_fails_build() {
        let ws = Workspace::new(Some(
            r#"{"name": "app", "scripts": {"kiln-postbuild": "echo postbuild broke; exit 2"}}"#,
        ));

        ws.compile()
            .assert()
            .failure()
            .stdout(predicate::str::contains("Build failed during post-build-hook"))
            .stdout(predicate::str::contains("kiln-postbuild"))
            .stderr(predicate::str::contains("Error:").not());

        let log = fs::read_to_string(ws.path("build.log")).unwrap();
        assert!(log.contains("postbuild broke"));
        assert!(!ws.path("cache/kiln/signature").exists());
    }

    #[test]
    fn cache_status_and_clear() {
        let ws = Workspace::new(Some(r#"{"name": "app"}"#));

        ws.kiln()
            .args(["cache", "status"])
            .arg(ws.path("project"))
            .arg(ws.path("cache"))
            .assert()
            .success()
            .stdout(predicate::str::contains("missing"));

        ws.compile().assert().success();

        ws.kiln()
            .args(["cache", "status"])
            .arg(ws.path("project"))
            .arg(ws.path("cache"))
            .assert()
            .success()
            .stdout(predicate::str::contains("valid"))
            .stdout(predicate::str::contains("v20.11.1 / 10.2.4"))
            .stdout(predicate::str::contains("Last build"));

        ws.kiln()
            .args(["cache", "clear", "--yes"])
            .arg(ws.path("cache"))
            .assert()
            .success();

        assert!(!ws.path("cache/kiln/signature").exists());
        assert!(!ws.path("cache/kiln/entries").exists());
    }

    #[test]
    fn config_set_local_writes_project_file() {
        let ws = Workspace::new(Some(r#"{"name": "app"}"#));
        ws.kiln()
            .current_dir(ws.path("project"))
            .args(["config", "set", "cache.enabled", "false", "--local"])
            .assert()
            .success();

        let local = fs::read_to_string(ws.path("project/.kiln.toml")).unwrap();
        assert!(local.contains("enabled = false"));
        assert!(local.contains("rebuild_command"));
    }
}
