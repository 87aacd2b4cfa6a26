//! Chain job generator (C5). Grounded on
//! `examples/original_source/backend/app/services/chain_job_service.py`:
//! `create_chain_jobs`/`_create_per_file_chain_jobs` build one job per (successful transfer ×
//! chain rule), resolving the new job's source from the *already-resolved* destination path of
//! the parent transfer, never from the parent's template.

use chrono::Utc;

use crate::model::{ChainRule, Job, JobConfig, JobType, Transfer, TransferStatus};
use crate::template_expander::{self, ExpansionContext};

/// Strips a leading `remote:` prefix (rclone remote-name syntax) if present, matching the
/// reference's `split(':', 1)` guard (`':' in actual_source_path`).
fn strip_remote_prefix(path: &str) -> &str {
    match path.split_once(':') {
        // a single leading path segment before ':' with no '/' in it is a remote name, not a
        // Windows drive letter or part of the path itself.
        Some((head, rest)) if !head.contains('/') && !head.is_empty() => rest,
        _ => path,
    }
}

/// Splits a resolved path into `(dir, filename)`, POSIX-style, independent of the host platform
/// (remote paths use forward slashes regardless of where the daemon runs).
fn split_dir_filename(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, filename)) => (if dir.is_empty() { "/".to_string() } else { dir.to_string() }, filename.to_string()),
        None => (".".to_string(), path.to_string()),
    }
}

fn build_child(parent: &Job, rule: &ChainRule, resolved_source: &str, chain_index: u32, parent_transfer_id: Option<uuid::Uuid>) -> Job {
    let stripped = strip_remote_prefix(resolved_source);
    let (dir, filename) = split_dir_filename(stripped);
    let ctx = ExpansionContext::new(&filename, Utc::now());
    let destination_path = template_expander::expand(&rule.path_template, &ctx);

    let mut child = Job::new(
        format!("{}-chain-{}", parent.name, chain_index),
        JobType::Chained,
        parent.destination_endpoint_id,
        dir,
        filename,
        rule.endpoint_id,
        destination_path,
    );
    child.parent_job_id = Some(parent.id);
    child.delete_source_after_transfer = false;
    child.config = JobConfig {
        parent_transfer_id,
        chain_index: Some(chain_index),
        chain_rule: Some(rule.clone()),
        ..JobConfig::default()
    };
    child
}

/// Builds one `CHAINED` job per `(transfer, chain_rule)` pair for every successfully completed
/// transfer. Returns an empty vec if the parent declares no chain rules.
pub fn create_chain_jobs(parent: &Job, completed_transfers: &[Transfer]) -> Vec<Job> {
    let chain_rules = &parent.config.chain_rules;
    if chain_rules.is_empty() {
        return Vec::new();
    }

    let successes: Vec<&Transfer> = completed_transfers
        .iter()
        .filter(|t| t.status == TransferStatus::Completed && t.destination_path.is_some())
        .collect();

    if !successes.is_empty() {
        let mut children = Vec::with_capacity(successes.len() * chain_rules.len());
        let mut index = 0u32;
        for transfer in &successes {
            let resolved = transfer.destination_path.as_deref().unwrap();
            for rule in chain_rules {
                children.push(build_child(parent, rule, resolved, index, Some(transfer.id)));
                index += 1;
            }
        }
        return children;
    }

    // Legacy fallback: no per-file transfer list available (e.g. called for a single-file
    // parent whose Transfer rows weren't passed in). Works only for single-file parents.
    chain_rules
        .iter()
        .enumerate()
        .map(|(i, rule)| build_child(parent, rule, &parent.destination_path, i as u32, None))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_parent(chain_rules: Vec<ChainRule>) -> Job {
        let src = Uuid::new_v4();
        let dst = Uuid::new_v4();
        let mut job = Job::new("batch", JobType::Manual, src, "/src", "*.mp4", dst, "/dst/{year}/{original_filename}");
        job.config.chain_rules = chain_rules;
        job
    }

    #[test]
    fn per_file_chain_strips_remote_prefix_and_splits_path() {
        let backup_ep = Uuid::new_v4();
        let rule = ChainRule { endpoint_id: backup_ep, path_template: "/backup/{year}/{filename}".to_string() };
        let parent = sample_parent(vec![rule.clone()]);

        let mut t1 = Transfer::new(parent.id, "a.mp4", "/src/a.mp4", 10);
        t1.start("remote:/dst/2025/a.mp4");
        t1.complete();
        let mut t2 = Transfer::new(parent.id, "b.mp4", "/src/b.mp4", 10);
        t2.start("remote:/dst/2025/b.mp4");
        t2.complete();

        let children = create_chain_jobs(&parent, &[t1, t2]);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].source_path, "/dst/2025");
        assert_eq!(children[0].file_pattern, "a.mp4");
        assert!(children[0].destination_path.ends_with("/a.mp4"));
        assert_eq!(children[0].destination_endpoint_id, backup_ep);
        assert_eq!(children[0].parent_job_id, Some(parent.id));
        assert_eq!(children[0].job_type, JobType::Chained);
    }

    #[test]
    fn no_chain_rules_yields_no_children() {
        let parent = sample_parent(vec![]);
        let mut t = Transfer::new(parent.id, "a.mp4", "/src/a.mp4", 10);
        t.start("/dst/a.mp4");
        t.complete();
        assert!(create_chain_jobs(&parent, &[t]).is_empty());
    }

    #[test]
    fn failed_transfers_are_excluded_from_chaining() {
        let rule = ChainRule { endpoint_id: Uuid::new_v4(), path_template: "/backup/{filename}".to_string() };
        let parent = sample_parent(vec![rule]);
        let mut ok = Transfer::new(parent.id, "a.mp4", "/src/a.mp4", 10);
        ok.start("/dst/a.mp4");
        ok.complete();
        let mut bad = Transfer::new(parent.id, "b.mp4", "/src/b.mp4", 10);
        bad.start("/dst/b.mp4");
        bad.fail("boom");
        let children = create_chain_jobs(&parent, &[ok, bad]);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].file_pattern, "a.mp4");
    }

    #[test]
    fn legacy_fallback_uses_parent_destination_when_no_transfers_given() {
        let rule = ChainRule { endpoint_id: Uuid::new_v4(), path_template: "/backup/{filename}".to_string() };
        let mut parent = sample_parent(vec![rule]);
        parent.destination_path = "/dst/clip.mov".to_string();
        let children = create_chain_jobs(&parent, &[]);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].file_pattern, "clip.mov");
        assert_eq!(children[0].source_path, "/dst");
    }
}
