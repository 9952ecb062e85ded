//! End-to-end tests for submitting and polling hash jobs

mod common;

use common::{POLL_TIMEOUT, artifact_count, params, runner, runner_with, session};
use rangehash_core::{
    Error, HasherConfig, JobStatus, RequestSpec, SessionId, Submission, new_digest,
};
use rangehash_test_utils::{ContentBuilder, Gate, MemoryResolver, patterned_bytes, wait_for_terminal};
use std::collections::HashSet;

fn completed(submission: Submission) -> rangehash_core::Job {
    match submission {
        Submission::Completed(job) => job,
        Submission::Queued(handle) => panic!("expected inline job, got {}", handle.id()),
    }
}

fn queued_id(submission: Submission) -> String {
    match submission {
        Submission::Queued(handle) => handle.id().to_string(),
        Submission::Completed(_) => panic!("expected a queued job"),
    }
}

#[cfg(test)]
mod inline_tests {
    use super::*;

    #[test]
    fn test_sha256_over_ten_thousand_bytes() {
        let (_root, resolver) = ContentBuilder::new()
            .sized_file("unit", "page.html", 10_000)
            .build();
        let (_artifacts, runner) = runner();
        let mut p = params("unit", "SingleDigestByContent");
        p.algorithm = Some("SHA-256".to_string());

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        assert_eq!(job.status(), JobStatus::Done);
        assert_eq!(job.counters().unwrap().bytes_hashed, 10_000);
        assert_eq!(job.counters().unwrap().files_hashed, 1);
        let digest = job.digest().unwrap();
        assert_eq!(digest.len(), 32);
        assert_eq!(
            digest,
            new_digest("SHA-256")
                .unwrap()
                .hash_bytes(&patterned_bytes(10_000))
        );
    }

    #[test]
    fn test_inline_job_is_not_registered() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"abc");
        let (_artifacts, runner) = runner();

        let spec = RequestSpec::validate(&params("unit", "1"), &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        assert!(job.status().is_terminal());
        assert_eq!(job.id(), None);
        assert!(runner.list(&session()).is_empty());
    }

    #[test]
    fn test_digest_is_deterministic_with_nonces() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"stable content");
        let (_artifacts, runner) = runner();
        let mut p = params("unit", "V1Content");
        p.challenge = Some("AAECAw==".to_string());
        p.verifier = Some("BAUG".to_string());

        let digests: Vec<Vec<u8>> = (0..3)
            .map(|_| {
                let spec = RequestSpec::validate(&p, &resolver).unwrap();
                let job = completed(runner.submit(spec, &session()).unwrap());
                job.digest().unwrap().to_vec()
            })
            .collect();

        assert_eq!(digests[0], digests[1]);
        assert_eq!(digests[1], digests[2]);
        let expected = new_digest("SHA-1")
            .unwrap()
            .hash_bytes(b"\x00\x01\x02\x03\x04\x05\x06stable content");
        assert_eq!(digests[0], expected);
    }

    #[test]
    fn test_unsupported_algorithm_ends_in_error() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"abc");
        let (_artifacts, runner) = runner();
        let mut p = params("unit", "SingleDigestByContent");
        p.algorithm = Some("FOO".to_string());

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error(), Some("Invalid hashing algorithm: FOO"));
    }

    #[test]
    fn test_listing_failure_ends_in_error() {
        let mut resolver = MemoryResolver::new();
        resolver.make_unlistable("unit");
        let (_artifacts, runner) = runner();

        let spec = RequestSpec::validate(&params("unit", "V3Tree"), &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error(), Some("Error hashing: unit listing failed"));
        let block = std::fs::read_to_string(job.block_file().unwrap()).unwrap();
        assert!(block.ends_with("\nError: Error hashing: unit listing failed"));
    }

    #[test]
    fn test_recording_truncates_at_limit() {
        let mut resolver = MemoryResolver::new();
        resolver
            .add_file("unit", "a", &patterned_bytes(3_000))
            .add_file("unit", "b", &patterned_bytes(2_000));
        let (_artifacts, runner) = runner_with(HasherConfig {
            truncate_filtered_stream: 1_024,
            ..Default::default()
        });
        let mut p = params("unit", "SingleDigestByContent");
        p.record = true;

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        assert_eq!(job.counters().unwrap().bytes_hashed, 5_000);
        let recording = job.recording().unwrap();
        assert_eq!(recording.recorded, 1_024);
        assert!(recording.is_truncated());
        let recorded = std::fs::read(job.record_file().unwrap()).unwrap();
        assert_eq!(recorded, patterned_bytes(3_000)[..1_024]);
    }

    #[test]
    fn test_recording_holds_nonces_then_content() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"content");
        let (_artifacts, runner) = runner();
        let mut p = params("unit", "SingleDigestByContent");
        p.challenge = Some("AAEC".to_string());
        p.record = true;

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        let recorded = std::fs::read(job.record_file().unwrap()).unwrap();
        assert_eq!(recorded, b"\x00\x01\x02content");
        assert_eq!(
            job.digest().unwrap(),
            new_digest("SHA-1").unwrap().hash_bytes(&recorded)
        );
        assert!(!job.recording().unwrap().is_truncated());
    }

    #[test]
    fn test_unlimited_recording_holds_whole_stream() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", &patterned_bytes(150_000));
        let (_artifacts, runner) = runner_with(HasherConfig {
            truncate_filtered_stream: -1,
            ..Default::default()
        });
        let mut p = params("unit", "V3Tree");
        p.record = true;

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let job = completed(runner.submit(spec, &session()).unwrap());

        assert_eq!(job.status(), JobStatus::Done);
        let len = std::fs::metadata(job.record_file().unwrap()).unwrap().len();
        assert_eq!(len, 150_000);
    }
}

#[cfg(test)]
mod background_tests {
    use super::*;

    #[test]
    fn test_unresolvable_range_creates_no_job() {
        let resolver = MemoryResolver::new();
        let (_artifacts, runner) = runner();
        let mut p = params("missing-unit", "V3Tree");
        p.background = true;

        let err = RequestSpec::validate(&p, &resolver).unwrap_err();

        assert!(matches!(
            Error::from(err),
            Error::Validation(rangehash_core::error::ValidationError::UnresolvedContent { .. })
        ));
        assert!(runner.list(&session()).is_empty());
    }

    #[test]
    fn test_concurrent_jobs_with_different_nonces() {
        let (_root, resolver) = ContentBuilder::new()
            .sized_file("unit", "a.html", 20_000)
            .sized_file("unit", "b.html", 5_000)
            .build();
        let (_artifacts, runner) = runner();

        let ids: Vec<String> = ["AQ==", "Ag=="]
            .iter()
            .map(|nonce| {
                let mut p = params("unit", "SingleDigestByContent");
                p.background = true;
                p.challenge = Some(nonce.to_string());
                let spec = RequestSpec::validate(&p, &resolver).unwrap();
                queued_id(runner.submit(spec, &session()).unwrap())
            })
            .collect();
        assert_ne!(ids[0], ids[1]);

        let jobs: Vec<_> = ids
            .iter()
            .map(|id| wait_for_terminal(&runner, &session(), id, POLL_TIMEOUT))
            .collect();

        for job in &jobs {
            assert_eq!(job.status(), JobStatus::Done);
            assert_eq!(job.counters().unwrap().bytes_hashed, 25_000);
        }
        assert_ne!(jobs[0].digest(), jobs[1].digest());
        assert_eq!(runner.list(&session()).len(), 2);
    }

    #[test]
    fn test_terminal_status_never_regresses() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"abc");
        let (_artifacts, runner) = runner();
        let mut p = params("unit", "V3Tree");
        p.background = true;

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let id = queued_id(runner.submit(spec, &session()).unwrap());
        let done = wait_for_terminal(&runner, &session(), &id, POLL_TIMEOUT);

        for _ in 0..20 {
            assert_eq!(runner.status(&session(), &id).unwrap().status(), done.status());
        }
    }

    #[test]
    fn test_ids_are_unique_across_many_jobs() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"x");
        let (_artifacts, runner) = runner();
        let mut p = params("unit", "V1Name");
        p.background = true;

        let ids: HashSet<String> = (0..50)
            .map(|_| {
                let spec = RequestSpec::validate(&p, &resolver).unwrap();
                queued_id(runner.submit(spec, &session()).unwrap())
            })
            .collect();

        assert_eq!(ids.len(), 50);
        for id in &ids {
            wait_for_terminal(&runner, &session(), id, POLL_TIMEOUT);
        }
    }

    #[test]
    fn test_status_of_unknown_id() {
        let (_artifacts, runner) = runner();
        let err = runner.status(&session(), "ZZZZZ").unwrap_err();
        assert_eq!(err.to_string(), "No such background hash: ZZZZZ");
        let err = runner.status(&session(), "").unwrap_err();
        assert_eq!(err.to_string(), "Must supply req_id");
    }

    #[test]
    fn test_removing_running_job_cancels_it() {
        let gate = Gate::new();
        let mut resolver = MemoryResolver::new();
        resolver.add_gated("unit", "slow", &patterned_bytes(50_000), &gate);
        let (artifacts, runner) = runner_with(HasherConfig {
            step_size: 16,
            ..Default::default()
        });
        let mut p = params("unit", "V3Tree");
        p.background = true;

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let id = queued_id(runner.submit(spec, &session()).unwrap());

        let removed = runner.remove(&session(), &id).unwrap();
        assert!(!removed.status().is_terminal());
        gate.open();

        // The worker notices the cancellation and removes its block file
        let deadline = std::time::Instant::now() + POLL_TIMEOUT;
        while artifact_count(&artifacts) > 0 {
            assert!(std::time::Instant::now() < deadline, "artifacts not cleaned up");
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert!(runner.status(&session(), &id).is_err());
    }

    #[test]
    fn test_session_scope_keeps_jobs_apart() {
        let mut resolver = MemoryResolver::new();
        resolver.add_file("unit", "a", b"abc");
        let (artifacts, runner) = runner_with(HasherConfig {
            global_background_requests: false,
            ..Default::default()
        });
        let alice = SessionId::new("alice");
        let bob = SessionId::new("bob");
        let mut p = params("unit", "V3Tree");
        p.background = true;

        let spec = RequestSpec::validate(&p, &resolver).unwrap();
        let id = queued_id(runner.submit(spec, &alice).unwrap());
        wait_for_terminal(&runner, &alice, &id, POLL_TIMEOUT);

        assert!(runner.status(&bob, &id).is_err());
        assert_eq!(runner.list(&alice).len(), 1);
        assert_eq!(artifact_count(&artifacts), 1);

        assert_eq!(runner.end_session(&alice), 1);
        assert_eq!(artifact_count(&artifacts), 0);
        assert!(runner.list(&alice).is_empty());
    }

    #[test]
    fn test_lookups_do_not_open_sessions() {
        let (_artifacts, runner) = runner_with(HasherConfig {
            global_background_requests: false,
            ..Default::default()
        });
        let stranger = SessionId::new("stranger");

        let err = runner.status(&stranger, "ZZZZZ").unwrap_err();
        assert_eq!(err.to_string(), "No such background hash: ZZZZZ");
        let err = runner.remove(&stranger, "").unwrap_err();
        assert_eq!(err.to_string(), "Must supply req_id");
        assert!(runner.list(&stranger).is_empty());

        assert!(runner.registries().existing(&stranger).is_none());
    }
}
