use super::*;
use crate::lm::testing::ScriptedBackend;
use crate::lm::LmError;
use std::fs;

const V1_FIXED: &str = r#"{"validation_report": "added missing image", "fixed_tekton_yaml": "kind: Pipeline # v1"}"#;
const V2_FIXED: &str = r#"{"validation_report": "nothing left to fix", "fixed_tekton_yaml": "kind: Pipeline # v2"}"#;

struct Project {
    _dir: tempfile::TempDir,
    input: PathBuf,
    output: PathBuf,
    prompts: PromptStore,
    run_log: RunLog,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let input = dir.path().join("jenkins");
        fs::create_dir_all(&input).expect("create input dir");
        let prompts_dir = dir.path().join("prompts");
        fs::create_dir_all(&prompts_dir).expect("create prompts dir");
        for role in [
            PromptRole::SourceToIntermediate,
            PromptRole::IntermediateToTarget,
            PromptRole::Validate,
            PromptRole::Fix,
        ] {
            fs::write(prompts_dir.join(role.file_name()), format!("prompt for {role}"))
                .expect("write prompt");
        }
        Self {
            input,
            output: dir.path().join("tekton"),
            prompts: PromptStore::new(prompts_dir),
            run_log: RunLog::new(dir.path().join("tekton_validation_errors.log")),
            _dir: dir,
        }
    }

    fn source(&self, name: &str) -> PathBuf {
        let path = self.input.join(name);
        fs::write(&path, "pipeline { agent any }").expect("write source");
        path
    }

    fn run(&self, backend: &ScriptedBackend, run_number: u64) -> RunSummary {
        let orchestrator = Orchestrator {
            conversion: ConversionClient::new(backend, "gpt-test"),
            validation: ValidationClient::new(backend, "gpt-test"),
            prompts: &self.prompts,
            run_log: &self.run_log,
            input_dir: self.input.clone(),
            output_dir: self.output.clone(),
        };
        orchestrator.run(run_number).expect("run pipeline")
    }

    fn names(&self, run_number: u64, base: &str) -> ArtifactNames {
        ArtifactNames::new(&self.output, run_number, base)
    }

    fn log(&self) -> String {
        self.run_log.read().expect("read run log")
    }
}

#[test]
fn full_pipeline_writes_every_stage_and_both_reports() {
    let project = Project::new();
    project.source("app.jenkinsfile");
    let backend = ScriptedBackend::new()
        .reply(r#"{"name": "app"}"#)
        .reply("kind: Pipeline # initial")
        .reply(V1_FIXED)
        .reply(V2_FIXED);

    let summary = project.run(&backend, 4);

    let names = project.names(4, "app");
    assert_eq!(fs::read_to_string(names.intermediate()).unwrap(), r#"{"name": "app"}"#);
    assert_eq!(
        fs::read_to_string(names.target(TargetStage::Initial)).unwrap(),
        "kind: Pipeline # initial"
    );
    assert_eq!(
        fs::read_to_string(names.target(TargetStage::Validated)).unwrap(),
        "kind: Pipeline # v1"
    );
    assert_eq!(
        fs::read_to_string(names.target(TargetStage::Validated2)).unwrap(),
        "kind: Pipeline # v2"
    );
    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.artifacts_written(), 4);
    assert!(matches!(
        summary.files[0].outcome,
        FileOutcome::Completed {
            last_stage: TargetStage::Validated2,
            ..
        }
    ));

    // Prompts per role, and each pass validates the previous stage's YAML.
    assert_eq!(backend.calls(), 4);
    assert_eq!(
        backend.request(0).messages[0].content,
        "prompt for source->intermediate"
    );
    assert_eq!(
        backend.request(1).messages[0].content,
        "prompt for intermediate->target"
    );
    assert_eq!(backend.request(2).messages[0].content, "prompt for validate");
    assert!(backend.request(2).messages[1]
        .content
        .contains("kind: Pipeline # initial"));
    assert_eq!(backend.request(3).messages[0].content, "prompt for fix");
    assert!(backend.request(3).messages[1]
        .content
        .contains("kind: Pipeline # v1"));

    let log = project.log();
    let expected_first = format!(
        "--- Validation Report for Run 4, File: {} ---\nadded missing image\n--- End Report ---\n\n",
        names.target(TargetStage::Initial).display()
    );
    let expected_second = format!(
        "--- Second Validation Report for Run 4, File: {} ---\nnothing left to fix\n--- End Second Report ---\n\n",
        names.target(TargetStage::Validated).display()
    );
    assert!(log.starts_with("# Tekton Validation Errors and Reports - Run 4\n\n"));
    assert!(log.contains(&expected_first), "log was:\n{log}");
    assert!(log.ends_with(&expected_second), "log was:\n{log}");
}

#[test]
fn non_json_conversion_skips_file_and_continues() {
    let project = Project::new();
    project.source("a.groovy");
    project.source("b.groovy");
    let backend = ScriptedBackend::new()
        .reply("I could not convert this pipeline, sorry.")
        .reply(r#"{"name": "b"}"#)
        .reply("kind: Pipeline")
        .reply(r#"{"validation_report": "ok"}"#);

    let summary = project.run(&backend, 1);

    let a = project.names(1, "a");
    assert!(!a.intermediate().exists());
    assert!(!a.target(TargetStage::Initial).exists());
    assert!(!a.target(TargetStage::Validated).exists());
    assert!(!a.target(TargetStage::Validated2).exists());

    let b = project.names(1, "b");
    assert!(b.intermediate().exists());
    assert!(b.target(TargetStage::Initial).exists());

    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].0.ends_with("a.groovy"));
    assert_eq!(failures[0].1, Stage::ConvertToIntermediate);
    assert_eq!(summary.completed(), 1);
}

#[test]
fn zero_sources_leave_header_only() {
    let project = Project::new();
    fs::write(project.input.join("README.md"), "not a pipeline").unwrap();
    fs::write(project.input.join("Jenkinsfile"), "no extension").unwrap();
    let backend = ScriptedBackend::new();

    let summary = project.run(&backend, 9);

    assert_eq!(summary.discovered(), 0);
    assert_eq!(backend.calls(), 0);
    assert_eq!(
        project.log(),
        "# Tekton Validation Errors and Reports - Run 9\n\n"
    );
    assert!(project.output.is_dir());
}

#[test]
fn missing_fix_skips_validated_file_but_logs_report() {
    let project = Project::new();
    project.source("svc.jenkins");
    let backend = ScriptedBackend::new()
        .reply("{}")
        .reply("kind: Pipeline")
        .reply(r#"{"validation_report": "step has no image"}"#);

    let summary = project.run(&backend, 2);

    let names = project.names(2, "svc");
    assert!(names.target(TargetStage::Initial).exists());
    assert!(!names.target(TargetStage::Validated).exists());
    assert!(!names.target(TargetStage::Validated2).exists());
    assert_eq!(backend.calls(), 3);

    let log = project.log();
    assert!(log.contains("--- Validation Report for Run 2"));
    assert!(log.contains("step has no image"));
    assert!(!log.contains("Second Validation Report"));
    assert!(matches!(
        summary.files[0].outcome,
        FileOutcome::Completed {
            last_stage: TargetStage::Initial,
            ..
        }
    ));
}

#[test]
fn unparsable_validation_is_logged_and_stops_further_passes() {
    let project = Project::new();
    project.source("web.groovy");
    let backend = ScriptedBackend::new()
        .reply("{}")
        .reply("kind: Pipeline")
        .reply("definitely not json");

    project.run(&backend, 5);

    let names = project.names(5, "web");
    assert!(!names.target(TargetStage::Validated).exists());
    let log = project.log();
    assert!(log.contains("JSON Parse Error"));
    assert!(!log.contains("Second Validation Report"));
}

#[test]
fn second_pass_without_fix_keeps_first_validated_file() {
    let project = Project::new();
    project.source("api.jenkinsfile");
    let backend = ScriptedBackend::new()
        .reply("{}")
        .reply("kind: Pipeline")
        .reply(V1_FIXED)
        .reply(r#"{"validation_report": "could not repair"}"#);

    let summary = project.run(&backend, 3);

    let names = project.names(3, "api");
    assert!(names.target(TargetStage::Validated).exists());
    assert!(!names.target(TargetStage::Validated2).exists());
    assert!(project.log().contains("could not repair"));
    assert_eq!(summary.artifacts_written(), 3);
}

#[test]
fn upstream_failure_on_target_conversion_keeps_json_only() {
    let project = Project::new();
    project.source("job.jenkinsfile");
    let backend = ScriptedBackend::new()
        .reply(r#"{"stages": []}"#)
        .fail(LmError::Upstream("status 429".to_string()));

    let summary = project.run(&backend, 1);

    let names = project.names(1, "job");
    assert!(names.intermediate().exists());
    assert!(!names.target(TargetStage::Initial).exists());
    assert_eq!(summary.failures()[0].1, Stage::ConvertToTarget);
    assert_eq!(
        project.log(),
        "# Tekton Validation Errors and Reports - Run 1\n\n"
    );
}

#[test]
fn write_failure_aborts_remaining_steps_for_that_file() {
    let project = Project::new();
    project.source("app.jenkinsfile");
    let names = project.names(6, "app");
    // A directory where the validated file should go makes the write fail.
    fs::create_dir_all(names.target(TargetStage::Validated)).unwrap();
    let backend = ScriptedBackend::new()
        .reply("{}")
        .reply("kind: Pipeline")
        .reply(V1_FIXED)
        .reply(V2_FIXED);

    let summary = project.run(&backend, 6);

    assert_eq!(backend.calls(), 3);
    assert!(!names.target(TargetStage::Validated2).exists());
    assert_eq!(
        summary.failures()[0].1,
        Stage::SaveTarget(TargetStage::Validated)
    );
    assert!(project.log().contains("added missing image"));
}

#[test]
fn discovery_follows_pattern_order() {
    let project = Project::new();
    for name in ["z.jenkinsfile", "b.groovy", "a.groovy", "m.jenkins", "notes.txt"] {
        project.source(name);
    }

    let found: Vec<String> = discover_sources(&project.input)
        .unwrap()
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(found, ["z.jenkinsfile", "m.jenkins", "a.groovy", "b.groovy"]);
}

#[test]
fn discovery_skips_hidden_files() {
    let project = Project::new();
    project.source(".old.groovy");
    project.source(".Jenkinsfile.jenkinsfile");
    project.source("app.groovy");

    let found = discover_sources(&project.input).unwrap();

    assert_eq!(found, [project.input.join("app.groovy")]);
}

#[test]
fn unpreparable_output_still_resets_log() {
    let project = Project::new();
    fs::write(
        project.run_log.path(),
        "# Tekton Validation Errors and Reports - Run 7\n\nOLD FEEDBACK\n",
    )
    .unwrap();
    fs::write(&project.output, "not a directory").unwrap();
    project.source("app.groovy");
    let backend = ScriptedBackend::new();
    let orchestrator = Orchestrator {
        conversion: ConversionClient::new(&backend, "gpt-test"),
        validation: ValidationClient::new(&backend, "gpt-test"),
        prompts: &project.prompts,
        run_log: &project.run_log,
        input_dir: project.input.clone(),
        output_dir: project.output.clone(),
    };

    assert!(orchestrator.run(8).is_err());

    assert_eq!(project.log(), "# Tekton Validation Errors and Reports - Run 8\n\n");
    assert_eq!(backend.calls(), 0);
}

#[test]
fn missing_input_directory_is_an_empty_run() {
    let project = Project::new();
    fs::remove_dir_all(&project.input).unwrap();
    assert!(discover_sources(&project.input).unwrap().is_empty());
}
