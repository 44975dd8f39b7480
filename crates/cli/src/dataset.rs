use anyhow::{Context as AnyhowContext, Result};
use devbench_protocol::{instance_id, SpecificationEntry, StepOutcome, TaskInstance};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Repositories admitted into the benchmark unless the config names others.
pub const DEFAULT_REPOSITORIES: &[&str] = &[
    "arrow-py/arrow",
    "pyca/cryptography",
    "librosa/librosa",
    "marshmallow-code/marshmallow",
    "mwaskom/seaborn",
    "python-pillow/Pillow",
    "piskvorky/gensim",
    "pydantic/pydantic",
    "pallets/jinja",
    "pytransitions/transitions",
    "pylint-dev/pylint",
    "pandas-dev/pandas",
];

pub const LITE_CAP: usize = 50;

/// `python -m pytest <ids...>`
pub fn pytest_command(test_ids: &[String]) -> String {
    let mut parts = vec!["python", "-m", "pytest"];
    parts.extend(test_ids.iter().map(String::as_str));
    parts.join(" ")
}

/// Join step outcomes with specifications into task instances.
///
/// Steps flagged as trivial and steps without a specification are dropped; the survivors are
/// numbered from 1 in step order.
pub fn merge_instances(
    repo: &str,
    outcomes: &[StepOutcome],
    specifications: &[SpecificationEntry],
) -> Vec<TaskInstance> {
    let specs: HashMap<usize, &str> = specifications
        .iter()
        .map(|entry| (entry.step, entry.specification.as_str()))
        .collect();

    let mut instances = Vec::new();
    for outcome in outcomes {
        if !outcome.flag {
            log::debug!("Step {}: trivial patch, dropped", outcome.step);
            continue;
        }
        let Some(specification) = specs.get(&outcome.step) else {
            log::warn!("Step {}: no specification, dropped", outcome.step);
            continue;
        };
        instances.push(TaskInstance {
            instance_id: instance_id(repo, instances.len() + 1),
            repo: repo.to_string(),
            problem_statement: specification.to_string(),
            base_commit: outcome.base_commit.clone(),
            reference_commit: outcome.reference_commit.clone(),
            patch: outcome.reference_patch.clone(),
            fail_to_pass: outcome.fail_to_pass.clone(),
            pass_to_pass: outcome.pass_to_pass.clone(),
        });
    }
    log::info!(
        "{repo}: {} of {} steps became task instances",
        instances.len(),
        outcomes.len()
    );
    instances
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchSelection {
    pub instances: Vec<TaskInstance>,
    /// Selected instances per repository
    pub stats: BTreeMap<String, usize>,
}

/// Keep instances of allow-listed repositories, at most `cap` per repository.
pub fn select_bench(
    instances: &[TaskInstance],
    repositories: &[String],
    cap: Option<usize>,
) -> BenchSelection {
    let allowed: HashSet<&str> = repositories.iter().map(String::as_str).collect();
    let mut selection = BenchSelection::default();

    for instance in instances {
        if !allowed.contains(instance.repo.as_str()) {
            continue;
        }
        let count = selection.stats.entry(instance.repo.clone()).or_insert(0);
        if cap.is_some_and(|cap| *count >= cap) {
            continue;
        }
        *count += 1;
        selection.instances.push(instance.clone());
    }
    selection
}

pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut items = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        items.push(
            serde_json::from_str(&line)
                .with_context(|| format!("Invalid record at {}:{}", path.display(), idx + 1))?,
        );
    }
    Ok(items)
}

pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(step: usize, flag: bool) -> StepOutcome {
        StepOutcome {
            step,
            skeleton_files: vec![],
            reference_files: vec![],
            reference_patch: format!("patch-{step}"),
            fail_to_pass: vec![format!("t{step}")],
            pass_to_pass: (0..step).map(|s| format!("t{s}")).collect(),
            base_commit: format!("base-{step}"),
            reference_commit: format!("ref-{step}"),
            flag,
        }
    }

    fn spec(step: usize) -> SpecificationEntry {
        SpecificationEntry {
            step,
            specification: format!("spec-{step}"),
        }
    }

    fn instance(repo: &str, n: usize) -> TaskInstance {
        TaskInstance {
            instance_id: instance_id(repo, n),
            repo: repo.into(),
            problem_statement: String::new(),
            base_commit: String::new(),
            reference_commit: String::new(),
            patch: String::new(),
            fail_to_pass: vec![],
            pass_to_pass: vec![],
        }
    }

    #[test]
    fn test_command_lists_ids() {
        assert_eq!(
            pytest_command(&["tests/test_a.py::test_one".into(), "tests/test_b.py".into()]),
            "python -m pytest tests/test_a.py::test_one tests/test_b.py"
        );
        assert_eq!(pytest_command(&[]), "python -m pytest");
    }

    #[test]
    fn merge_drops_trivial_and_unspecified_steps() {
        let outcomes = vec![outcome(0, true), outcome(1, false), outcome(2, true), outcome(3, true)];
        let specs = vec![spec(0), spec(1), spec(3)];

        let instances = merge_instances("psf/requests", &outcomes, &specs);
        let ids: Vec<_> = instances.iter().map(|i| i.instance_id.as_str()).collect();
        assert_eq!(ids, vec!["psf__--__requests-dev-1", "psf__--__requests-dev-2"]);
        assert_eq!(instances[1].problem_statement, "spec-3");
        assert_eq!(instances[1].base_commit, "base-3");
        assert_eq!(instances[1].patch, "patch-3");
        assert_eq!(instances[1].pass_to_pass, vec!["t0", "t1", "t2"]);
    }

    #[test]
    fn bench_filters_and_caps_per_repository() {
        let mut all: Vec<_> = (1..=4).map(|n| instance("pallets/jinja", n)).collect();
        all.push(instance("someone/else", 1));
        all.extend((1..=2).map(|n| instance("pydantic/pydantic", n)));
        let repos = vec!["pallets/jinja".to_string(), "pydantic/pydantic".to_string()];

        let full = select_bench(&all, &repos, None);
        assert_eq!(full.instances.len(), 6);

        let lite = select_bench(&all, &repos, Some(3));
        assert_eq!(lite.instances.len(), 5);
        assert_eq!(
            lite.stats,
            BTreeMap::from([
                ("pallets/jinja".to_string(), 3),
                ("pydantic/pydantic".to_string(), 2)
            ])
        );
    }

    #[test]
    fn jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/instances.jsonl");
        let items = vec![instance("a/b", 1), instance("a/b", 2)];
        write_jsonl(&path, &items).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.lines().all(|line| line.contains("\"instance_id\"")));
        assert_eq!(read_jsonl::<TaskInstance>(&path).unwrap(), items);
    }
}
