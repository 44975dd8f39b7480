use anyhow::Result;
use devbench_cli::pipeline::{recover_outcomes, StepPipeline};
use devbench_cli::tokens::{EstimateCounter, TokenCounter};
use devbench_cli::vcs::VersionControl;
use devbench_patch::apply_patch;
use devbench_protocol::{
    CallRelation, DocstringEntry, DocstringMap, FileContent, FunctionRef, NodeId, TraceRecord,
};
use devbench_rewriter::{Rewriter, RewriterConfig};
use devbench_schedule::build_schedule;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;

/// In-memory stand-in for a git tree: branches map to their commit, commits are numbered.
#[derive(Default)]
struct RecordingVcs {
    branch: String,
    heads: BTreeMap<String, String>,
    commits: usize,
    ops: Vec<String>,
    written: Vec<(String, Vec<FileContent>)>,
}

impl RecordingVcs {
    fn new() -> Self {
        Self {
            branch: "main".into(),
            heads: BTreeMap::from([("main".to_string(), "c0".to_string())]),
            ..Default::default()
        }
    }
}

impl VersionControl for RecordingVcs {
    fn create_and_checkout(&mut self, branch: &str) -> Result<()> {
        let head = self.heads[&self.branch].clone();
        self.heads.insert(branch.to_string(), head);
        self.branch = branch.to_string();
        self.ops.push(format!("create {branch}"));
        Ok(())
    }

    fn write_files(&mut self, files: &[FileContent]) -> Result<()> {
        self.written.push((self.branch.clone(), files.to_vec()));
        self.ops.push(format!("write {}", files.len()));
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<()> {
        self.commits += 1;
        self.heads
            .insert(self.branch.clone(), format!("c{}", self.commits));
        self.ops.push(format!("commit {message}"));
        Ok(())
    }

    fn checkout(&mut self, branch: &str) -> Result<()> {
        if !self.heads.contains_key(branch) {
            anyhow::bail!("unknown branch {branch}");
        }
        self.branch = branch.to_string();
        self.ops.push(format!("checkout {branch}"));
        Ok(())
    }

    fn current_commit_hash(&self) -> Result<String> {
        Ok(self.heads[&self.branch].clone())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.branch.clone())
    }
}

fn call(caller: (&str, usize, &str), callee: (&str, usize, &str)) -> CallRelation {
    let r = |(filepath, lineno, func_name): (&str, usize, &str)| FunctionRef {
        filepath: filepath.into(),
        lineno,
        func_name: func_name.into(),
    };
    CallRelation {
        caller: r(caller),
        callee: r(callee),
    }
}

const CALC: &str = r#"def f(x):
    return g(x) + 1


def g(x):
    return x * 2


def h(x):
    return f(x) - g(x)
"#;

/// test_a reaches {f, g}; test_b reaches {f, g, h}.
fn traces() -> Vec<TraceRecord> {
    let test_a = ("tests/test_calc.py", 1, "test_a");
    let test_b = ("tests/test_calc.py", 5, "test_b");
    let f = ("pkg/calc.py", 1, "f");
    let g = ("pkg/calc.py", 5, "g");
    let h = ("pkg/calc.py", 9, "h");
    vec![
        TraceRecord {
            test_id: "tests/test_calc.py::test_b".into(),
            test_func_id: NodeId::new(test_b.0, test_b.1, test_b.2),
            call_relations: vec![call(test_b, h), call(h, f), call(f, g), call(h, g)],
        },
        TraceRecord {
            test_id: "tests/test_calc.py::test_a".into(),
            test_func_id: NodeId::new(test_a.0, test_a.1, test_a.2),
            call_relations: vec![call(test_a, f), call(f, g)],
        },
    ]
}

fn file_map(files: &[FileContent]) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|file| (file.filepath.clone(), file.content.clone()))
        .collect()
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg/calc.py"), CALC).unwrap();
    dir
}

#[test]
fn two_traces_become_two_incremental_steps() {
    let dir = project();
    let plan = build_schedule(&traces()).unwrap();
    assert_eq!(plan.steps.len(), 2);

    let docstrings: DocstringMap = BTreeMap::from([(
        NodeId::new("pkg/calc.py", 1, "f"),
        DocstringEntry {
            docstring: "Double via g, plus one.".into(),
            function_content: String::new(),
        },
    )]);

    let mut vcs = RecordingVcs::new();
    let mut rewriter = Rewriter::new(RewriterConfig::default()).unwrap();
    let mut pipeline = StepPipeline {
        vcs: &mut vcs,
        rewriter: &mut rewriter,
        counter: &EstimateCounter,
        threshold: 10,
    };
    let outcomes = pipeline.run(dir.path(), &plan.steps, &docstrings).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].fail_to_pass, vec!["tests/test_calc.py::test_a"]);
    assert!(outcomes[0].pass_to_pass.is_empty());
    assert_eq!(outcomes[1].fail_to_pass, vec!["tests/test_calc.py::test_b"]);
    assert_eq!(outcomes[1].pass_to_pass, vec!["tests/test_calc.py::test_a"]);

    // Step 0 stubs f (target of test_a) and removes g (reached only through f).
    let skeleton = &outcomes[0].skeleton_files[0].content;
    assert!(skeleton.contains("def f(x):\n    \"\"\"\n    Double via g, plus one.\n    \"\"\"\n    ...\n"));
    assert!(!skeleton.contains("def g(x)"));
    assert!(skeleton.contains("def h(x):\n    return f(x) - g(x)\n"));
    assert_eq!(
        outcomes[0].reference_files[0].content.matches("TODO: Implement this function").count(),
        1
    );
    assert!(outcomes[0].reference_patch.starts_with("--- pkg/calc.py\n+++ pkg/calc.py\n"));
    assert!(outcomes[0].flag);

    // Step 1 develops only h; f and g were claimed by step 0.
    let skeleton = &outcomes[1].skeleton_files[0].content;
    assert!(skeleton.contains("def f(x):\n    return g(x) + 1\n"));
    assert!(skeleton.contains("def h(x):\n    \"\"\"\n    TODO: Implement this function\n    \"\"\"\n    ...\n"));

    for outcome in &outcomes {
        let patched = apply_patch(&file_map(&outcome.skeleton_files), &outcome.reference_patch)
            .unwrap();
        assert_eq!(patched, file_map(&outcome.reference_files), "step {}", outcome.step);
    }

    // Each step forks both branches from main and returns to it.
    assert_eq!(
        vcs.ops[..8].to_vec(),
        vec![
            "create step-0-skeleton",
            "write 1",
            "commit prepare skeleton for step 0",
            "checkout main",
            "create step-0-reference",
            "write 1",
            "commit prepare reference for step 0",
            "checkout main",
        ]
    );
    assert_eq!(vcs.branch, "main");
    assert_eq!(outcomes[0].base_commit, "c1");
    assert_eq!(outcomes[0].reference_commit, "c2");
    assert_eq!(outcomes[1].base_commit, "c3");
    assert_eq!(outcomes[1].reference_commit, "c4");
    assert_eq!(vcs.written[1].0, "step-0-reference");
}

#[test]
fn tiny_patches_are_flagged_trivial() {
    struct Fixed(usize);
    impl TokenCounter for Fixed {
        fn count(&self, _text: &str) -> usize {
            self.0
        }
    }

    let dir = project();
    let plan = build_schedule(&traces()).unwrap();
    let mut vcs = RecordingVcs::new();
    let mut rewriter = Rewriter::new(RewriterConfig::default()).unwrap();
    let outcomes = StepPipeline {
        vcs: &mut vcs,
        rewriter: &mut rewriter,
        counter: &Fixed(9),
        threshold: 10,
    }
    .run(dir.path(), &plan.steps, &DocstringMap::new())
    .unwrap();
    assert!(outcomes.iter().all(|o| !o.flag));
}

#[test]
fn recovery_reads_step_branches() {
    let dir = project();
    let plan = build_schedule(&traces()).unwrap();
    let mut vcs = RecordingVcs::new();
    let mut rewriter = Rewriter::new(RewriterConfig::default()).unwrap();
    let mut outcomes = StepPipeline {
        vcs: &mut vcs,
        rewriter: &mut rewriter,
        counter: &EstimateCounter,
        threshold: 10,
    }
    .run(dir.path(), &plan.steps, &DocstringMap::new())
    .unwrap();

    let expected = outcomes.clone();
    for outcome in &mut outcomes {
        outcome.base_commit.clear();
        outcome.reference_commit.clear();
        outcome.pass_to_pass.clear();
    }

    let recovered =
        recover_outcomes(&mut vcs, &plan.steps, outcomes, &EstimateCounter, 10).unwrap();
    assert_eq!(recovered, expected);
    assert_eq!(vcs.branch, "main");

    let err = recover_outcomes(&mut vcs, &plan.steps, vec![], &EstimateCounter, 10).unwrap_err();
    assert!(err.to_string().contains("2 steps"));
}
