//! End-to-end orchestration over the in-memory store and a recording
//! compute backend.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use common::*;
use microsim_core::error::CoreError;
use microsim_core::job::{JobInputs, JobKind, JobStatus, SimulationInputs, TaxBenefitModel};
use microsim_pipeline::sequencer::{CompositeKind, CompositeRequest};
use microsim_pipeline::service::{CompletionReport, EconomicImpactRequest};
use serde_json::json;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn completed(result: serde_json::Value) -> CompletionReport {
    CompletionReport {
        status: JobStatus::Completed,
        result: Some(result),
        error_message: None,
    }
}

fn failed(message: &str) -> CompletionReport {
    CompletionReport {
        status: JobStatus::Failed,
        result: None,
        error_message: Some(message.into()),
    }
}

fn economic_impact(policy_id: Option<Uuid>) -> EconomicImpactRequest {
    EconomicImpactRequest {
        tax_benefit_model: TaxBenefitModel::PolicyEngineUk,
        dataset_id: DATASET,
        policy_id,
        dynamic_id: None,
    }
}

// ---------------------------------------------------------------------------
// Simulations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn identical_requests_share_one_job_and_one_dispatch() {
    let h = harness();

    let first = h.service.create_simulation(simulation(None)).await.unwrap();
    assert!(first.created);
    assert_eq!(first.job.status, JobStatus::Running);

    let second = h.service.create_simulation(simulation(None)).await.unwrap();
    assert!(!second.created);
    assert_eq!(second.job.id, first.job.id);

    assert_eq!(h.backend.spawn_count(first.job.id).await, 1);
}

#[tokio::test]
async fn concurrent_identical_requests_dispatch_once() {
    let h = harness();

    let mut set = JoinSet::new();
    for _ in 0..16 {
        let service = h.service.clone();
        set.spawn(async move { service.create_simulation(simulation(None)).await.unwrap() });
    }

    let mut ids = Vec::new();
    let mut created = 0;
    while let Some(res) = set.join_next().await {
        let outcome = res.unwrap();
        ids.push(outcome.job.id);
        if outcome.created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(h.backend.spawned().await.len(), 1);
    assert_eq!(h.store.len().await, 1);
}

#[tokio::test]
async fn different_policy_derives_a_different_job() {
    let h = harness();

    let baseline = h.service.create_simulation(simulation(None)).await.unwrap();
    let reform = h
        .service
        .create_simulation(simulation(Some(POLICY)))
        .await
        .unwrap();

    assert_ne!(baseline.job.id, reform.job.id);
    assert!(reform.created);
}

#[tokio::test]
async fn simulation_with_another_models_version_is_rejected() {
    let h = harness();
    let mut inputs = simulation(None);
    inputs.tax_benefit_model = TaxBenefitModel::PolicyEngineUs;

    assert_matches!(
        h.service.create_simulation(inputs).await,
        Err(CoreError::Validation(msg)) if msg.contains("policyengine_uk")
    );
    assert!(h.store.is_empty().await);
    assert!(h.backend.spawned().await.is_empty());
}

#[tokio::test]
async fn existing_job_with_different_inputs_is_not_reused() {
    let h = harness();
    let mut uk = simulation(None);
    uk.model_version_id = Uuid::from_u128(0x0b);
    let job = h.service.create_simulation(uk.clone()).await.unwrap().job;

    let us = SimulationInputs {
        tax_benefit_model: TaxBenefitModel::PolicyEngineUs,
        ..uk
    };
    assert_matches!(
        h.service.create_simulation(us).await,
        Err(CoreError::Validation(_))
    );

    let stored = h.service.resolve(job.id).await.unwrap();
    assert_eq!(stored.inputs.tax_benefit_model(), TaxBenefitModel::PolicyEngineUk);
    assert_eq!(h.backend.spawn_count(job.id).await, 1);
}

#[tokio::test]
async fn completion_callback_is_visible_to_polling() {
    let h = harness();
    let job = h.service.create_simulation(simulation(None)).await.unwrap().job;

    h.service
        .record_completion(job.id, completed(json!({"x": 1})))
        .await
        .unwrap();

    let resolved = h.service.resolve(job.id).await.unwrap();
    assert_eq!(resolved.status, JobStatus::Completed);
    assert_eq!(resolved.result, Some(json!({"x": 1})));
    assert!(resolved.completed_at.is_some());
}

#[tokio::test]
async fn completed_job_rejects_further_transitions() {
    let h = harness();
    let job = h.service.create_simulation(simulation(None)).await.unwrap().job;
    h.service
        .record_completion(job.id, completed(json!({"x": 1})))
        .await
        .unwrap();

    let running = CompletionReport {
        status: JobStatus::Running,
        result: None,
        error_message: None,
    };
    assert_matches!(
        h.service.record_completion(job.id, running).await,
        Err(CoreError::InvalidTransition {
            from: JobStatus::Completed,
            to: JobStatus::Running,
            ..
        })
    );
    assert_matches!(
        h.service.record_completion(job.id, failed("late")).await,
        Err(CoreError::InvalidTransition { .. })
    );

    let resolved = h.service.resolve(job.id).await.unwrap();
    assert_eq!(resolved.result, Some(json!({"x": 1})));
    assert!(resolved.error_message.is_none());
}

#[tokio::test]
async fn repeated_completion_callback_is_idempotent() {
    let h = harness();
    let job = h.service.create_simulation(simulation(None)).await.unwrap().job;

    let first = h
        .service
        .record_completion(job.id, completed(json!({"x": 1})))
        .await
        .unwrap();
    let retry = h
        .service
        .record_completion(job.id, completed(json!({"x": 1})))
        .await
        .unwrap();

    assert!(first.changed);
    assert!(!retry.changed);
    assert_eq!(retry.job.completed_at, first.job.completed_at);
}

#[tokio::test]
async fn completion_without_result_is_rejected() {
    let h = harness();
    let job = h.service.create_simulation(simulation(None)).await.unwrap().job;

    let report = CompletionReport {
        status: JobStatus::Completed,
        result: None,
        error_message: None,
    };
    assert_matches!(
        h.service.record_completion(job.id, report).await,
        Err(CoreError::Validation(_))
    );
    assert_eq!(
        h.service.resolve(job.id).await.unwrap().status,
        JobStatus::Running
    );
}

#[tokio::test]
async fn failed_job_without_message_still_reports_one() {
    let h = harness();
    let job = h.service.create_simulation(simulation(None)).await.unwrap().job;

    h.service
        .record_completion(job.id, failed("   "))
        .await
        .unwrap();

    let resolved = h.service.resolve(job.id).await.unwrap();
    assert_eq!(resolved.status, JobStatus::Failed);
    assert!(!resolved.error_message.unwrap().trim().is_empty());
}

#[tokio::test]
async fn unreachable_compute_fails_the_job_instead_of_leaving_it_pending() {
    let h = harness_with(RecordingBackend::failing());

    let created = h.service.create_simulation(simulation(None)).await.unwrap();

    assert!(created.created);
    assert_eq!(created.job.status, JobStatus::Failed);
    let message = created.job.error_message.unwrap();
    assert!(message.starts_with("Dispatch failed"), "{message}");
    assert!(message.contains("503"), "{message}");

    // A repeat request reuses the failed job rather than recomputing.
    let again = h.service.create_simulation(simulation(None)).await.unwrap();
    assert!(!again.created);
    assert_eq!(again.job.status, JobStatus::Failed);
    assert_eq!(h.backend.spawned().await.len(), 1);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let h = harness();
    assert_matches!(
        h.service.resolve(Uuid::new_v4()).await,
        Err(CoreError::NotFound { .. })
    );
    assert_matches!(
        h.service
            .record_completion(Uuid::new_v4(), completed(json!({})))
            .await,
        Err(CoreError::NotFound { .. })
    );
}

// ---------------------------------------------------------------------------
// Households
// ---------------------------------------------------------------------------

#[tokio::test]
async fn household_requests_are_never_deduplicated() {
    let h = harness();

    let a = h.service.create_household(household(None)).await.unwrap();
    let b = h.service.create_household(household(None)).await.unwrap();

    assert!(a.created && b.created);
    assert_ne!(a.job.id, b.job.id);
    let functions: Vec<_> = h
        .backend
        .spawned()
        .await
        .into_iter()
        .map(|r| r.function)
        .collect();
    assert_eq!(functions, vec!["simulate_household_uk", "simulate_household_uk"]);
}

#[tokio::test]
async fn household_without_people_is_rejected() {
    let h = harness();
    let mut inputs = household(None);
    inputs.people.clear();

    assert_matches!(
        h.service.create_household(inputs).await,
        Err(CoreError::Validation(_))
    );
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn household_year_out_of_range_is_rejected() {
    let h = harness();
    let mut inputs = household(None);
    inputs.year = Some(1999);

    assert_matches!(
        h.service.create_household(inputs).await,
        Err(CoreError::Validation(_))
    );
}

// ---------------------------------------------------------------------------
// Composites
// ---------------------------------------------------------------------------

#[tokio::test]
async fn economic_impact_waits_for_both_simulations() {
    let h = harness();

    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    assert!(view.created);
    assert_eq!(view.job.kind, JobKind::EconomicImpact);
    assert_eq!(view.job.status, JobStatus::Pending);
    assert_eq!(view.baseline.status, JobStatus::Running);
    assert_eq!(view.reform.status, JobStatus::Running);

    let functions: Vec<_> = h
        .backend
        .spawned()
        .await
        .into_iter()
        .map(|r| r.function)
        .collect();
    assert_eq!(functions, vec!["simulation_uk", "simulation_uk"]);

    // Baseline is the no-policy simulation; reform carries the policy.
    let baseline = h.service.resolve(view.baseline.id).await.unwrap();
    let reform = h.service.resolve(view.reform.id).await.unwrap();
    assert_eq!(baseline.id, h.service.create_simulation(simulation(None)).await.unwrap().job.id);
    assert_eq!(reform.id, h.service.create_simulation(simulation(Some(POLICY))).await.unwrap().job.id);
}

#[tokio::test]
async fn economic_impact_reuses_cached_simulations_and_report() {
    let h = harness();

    let first = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();
    let second = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    assert!(!second.created);
    assert_eq!(first.job.id, second.job.id);
    assert_eq!(h.backend.spawned().await.len(), 2);
    assert_eq!(h.store.len().await, 3);
}

#[tokio::test]
async fn economic_impact_label_names_model_and_policy() {
    let h = harness();
    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    let microsim_core::job::JobInputs::EconomicImpact(inputs) = &view.job.inputs else {
        panic!("expected economic impact inputs");
    };
    assert_eq!(
        inputs.label,
        format!("Economic impact: policyengine_uk (policy {POLICY})")
    );
}

#[tokio::test]
async fn economic_impact_for_unconfigured_model_is_rejected() {
    let h = harness();
    let mut request = economic_impact(None);
    request.tax_benefit_model = microsim_core::job::TaxBenefitModel::PolicyEngineUs;

    assert_matches!(
        h.service.create_economic_impact(request).await,
        Err(CoreError::Validation(_))
    );
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn failed_reform_fails_composite_without_dispatching_it() {
    let h = harness();
    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    h.service
        .record_completion(view.reform.id, failed("model crashed"))
        .await
        .unwrap();
    h.service
        .sequencer()
        .advance_dependents(view.reform.id)
        .await
        .unwrap();

    let report = h.service.resolve(view.job.id).await.unwrap();
    assert_eq!(report.status, JobStatus::Failed);
    assert!(report.result.is_none());
    let message = report.error_message.unwrap();
    assert!(message.contains("reform"), "{message}");
    assert!(message.contains(&view.reform.id.to_string()), "{message}");
    assert!(message.contains("model crashed"), "{message}");

    assert_eq!(h.backend.spawn_count(view.job.id).await, 0);

    // Completing the baseline later does not revive the composite.
    h.service
        .record_completion(view.baseline.id, completed(json!({"x": 1})))
        .await
        .unwrap();
    h.service.sequencer().sweep().await.unwrap();
    assert_eq!(h.backend.spawn_count(view.job.id).await, 0);
}

#[tokio::test]
async fn completed_prerequisites_dispatch_the_composite_once() {
    let h = harness();
    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    h.service
        .record_completion(view.baseline.id, completed(json!({"budget": 1})))
        .await
        .unwrap();
    h.service
        .sequencer()
        .advance_dependents(view.baseline.id)
        .await
        .unwrap();
    assert_eq!(
        h.service.resolve(view.job.id).await.unwrap().status,
        JobStatus::Pending
    );

    h.service
        .record_completion(view.reform.id, completed(json!({"budget": 2})))
        .await
        .unwrap();
    h.service
        .sequencer()
        .advance_dependents(view.reform.id)
        .await
        .unwrap();
    h.service.sequencer().sweep().await.unwrap();

    let report = h.service.resolve(view.job.id).await.unwrap();
    assert_eq!(report.status, JobStatus::Running);
    assert_eq!(h.backend.spawn_count(view.job.id).await, 1);
    let spawned = h.backend.spawned().await;
    assert_eq!(spawned.last().unwrap().function, "economy_comparison_uk");
}

#[tokio::test]
async fn composite_over_finished_prerequisites_dispatches_on_creation() {
    let h = harness();
    let baseline = h.service.create_simulation(simulation(None)).await.unwrap().job;
    let reform = h
        .service
        .create_simulation(simulation(Some(POLICY)))
        .await
        .unwrap()
        .job;
    h.service
        .record_completion(baseline.id, completed(json!({})))
        .await
        .unwrap();
    h.service
        .record_completion(reform.id, completed(json!({})))
        .await
        .unwrap();

    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    assert_eq!(view.job.status, JobStatus::Running);
    assert_eq!(view.baseline.id, baseline.id);
    assert_eq!(h.backend.spawn_count(baseline.id).await, 1);
}

#[tokio::test]
async fn household_impact_is_computed_in_process() {
    let h = harness();
    let view = h
        .service
        .create_household_impact(household(Some(POLICY)))
        .await
        .unwrap();
    assert_eq!(view.job.kind, JobKind::HouseholdImpact);
    assert_ne!(view.baseline.id, view.reform.id);

    h.service
        .record_completion(view.baseline.id, completed(household_result(40000.0, 5000)))
        .await
        .unwrap();
    h.service
        .record_completion(view.reform.id, completed(household_result(40500.0, 4500)))
        .await
        .unwrap();
    h.service.sequencer().sweep().await.unwrap();

    let job = h.service.resolve(view.job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result["baseline"], household_result(40000.0, 5000));
    assert_eq!(result["impact"]["household"]["household_net_income"]["change"], 500.0);
    assert_eq!(result["impact"]["person"][0]["income_tax"]["change"], -500);

    // Only the two household calculations went to remote compute.
    assert_eq!(h.backend.spawned().await.len(), 2);
}

#[tokio::test]
async fn sequencer_loop_advances_composites_from_events() {
    let h = harness();
    let cancel = CancellationToken::new();
    let handle = h
        .service
        .sequencer()
        .clone()
        .spawn(h.service.events(), cancel.clone());

    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();
    h.service
        .record_completion(view.baseline.id, failed("out of memory"))
        .await
        .unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let job = h.service.resolve(view.job.id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("composite should fail once its baseline fails");

    assert_eq!(report.status, JobStatus::Failed);
    assert!(report.error_message.unwrap().contains("baseline"));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn resolve_composite_reports_prerequisites() {
    let h = harness();
    let view = h
        .service
        .create_economic_impact(economic_impact(None))
        .await
        .unwrap();

    let resolved = h
        .service
        .resolve_composite(view.job.id, JobKind::EconomicImpact)
        .await
        .unwrap();
    assert_eq!(resolved.baseline.id, view.baseline.id);
    assert_eq!(resolved.reform.id, view.reform.id);

    assert_matches!(
        h.service
            .resolve_composite(view.job.id, JobKind::HouseholdImpact)
            .await,
        Err(CoreError::NotFound { .. })
    );
    assert_matches!(
        h.service
            .resolve_composite(view.baseline.id, JobKind::EconomicImpact)
            .await,
        Err(CoreError::NotFound { .. })
    );
}

#[tokio::test]
async fn reports_for_a_pending_composite_are_rejected() {
    let h = harness();
    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();
    assert_eq!(view.job.status, JobStatus::Pending);

    let running = CompletionReport {
        status: JobStatus::Running,
        result: None,
        error_message: None,
    };
    assert_matches!(
        h.service.record_completion(view.job.id, running).await,
        Err(CoreError::InvalidTransition {
            from: JobStatus::Pending,
            to: JobStatus::Running,
            ..
        })
    );
    assert_matches!(
        h.service
            .record_completion(view.job.id, completed(json!({"x": 1})))
            .await,
        Err(CoreError::InvalidTransition {
            from: JobStatus::Pending,
            to: JobStatus::Completed,
            ..
        })
    );
    assert_matches!(
        h.service
            .record_completion(view.job.id, failed("not yours"))
            .await,
        Err(CoreError::InvalidTransition {
            from: JobStatus::Pending,
            to: JobStatus::Failed,
            ..
        })
    );

    let composite = h.service.resolve(view.job.id).await.unwrap();
    assert_eq!(composite.status, JobStatus::Pending);
    assert!(composite.result.is_none());
    assert!(composite.error_message.is_none());
    assert_eq!(h.backend.spawn_count(view.job.id).await, 0);
}

#[tokio::test]
async fn composite_reused_under_another_label_is_rejected() {
    let h = harness();
    let view = h
        .service
        .create_economic_impact(economic_impact(Some(POLICY)))
        .await
        .unwrap();

    let request = CompositeRequest {
        kind: CompositeKind::EconomicImpact,
        tax_benefit_model: TaxBenefitModel::PolicyEngineUk,
        label: "Something else".into(),
        baseline: JobInputs::Simulation(simulation(None)),
        reform: JobInputs::Simulation(simulation(Some(POLICY))),
    };
    assert_matches!(
        h.service.sequencer().create_composite(request).await,
        Err(CoreError::Validation(_))
    );

    let composite = h.service.resolve(view.job.id).await.unwrap();
    assert_eq!(composite.status, JobStatus::Pending);
}
