//! Running document managers over out-of-date assets.

use crate::catalog::Resolved;
use crate::curator::Inner;
use crate::document::{DocumentManager, TransformFlags, TransformRequest, TransformResult, TransformStatus};
use crate::guid::Guid;
use crate::state::{LogEntry, TransformState};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Outcome of [`Curator::transform_all_assets`](crate::Curator::transform_all_assets).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub transformed: usize,
    pub failed: usize,
    /// Already up to date for the requested profile.
    pub skipped: usize,
    pub failures: Vec<(Guid, TransformStatus)>,
}

struct Job {
    request: TransformRequest,
    manager: Arc<dyn DocumentManager>,
    asset_dependencies: Vec<Guid>,
    run_process: bool,
    run_thumbnail: bool,
}

enum Prepared {
    Done(TransformStatus),
    Run(Box<Job>),
}

impl Inner {
    fn prepare_transform(&self, guid: Guid, flags: TransformFlags, profile: &str) -> Prepared {
        let catalog = self.catalog();
        let Some(info) = catalog.registry.get(&guid) else {
            return Prepared::Done(TransformStatus::failure(format!("unknown asset {guid}")));
        };
        if !info.existence.exists() {
            return Prepared::Done(TransformStatus::failure(format!("{} was removed", info.path)));
        }
        let state = catalog.state_for_profile(guid, profile).unwrap_or(TransformState::Unknown);
        match state {
            TransformState::Unknown => {
                return Prepared::Done(TransformStatus::failure(format!("state of {} is not known yet", info.path)));
            },
            TransformState::CircularDependency | TransformState::MissingTransformDependency => {
                let message = info.log.iter().map(|entry| entry.message.as_str()).collect::<Vec<_>>().join("; ");
                return Prepared::Done(TransformStatus::failure(message));
            },
            TransformState::NeedsImport => return Prepared::Done(TransformStatus::needs_import()),
            TransformState::UpToDate | TransformState::TransformError if !flags.force => {
                let status = match state {
                    TransformState::UpToDate => TransformStatus::success(),
                    _ => TransformStatus::failure(format!("last transform of {} failed", info.path)),
                };
                return Prepared::Done(status);
            },
            _ => {},
        }
        if info.descriptor.flags.disable_transform {
            return Prepared::Done(TransformStatus::success());
        }
        let Some((_, manager)) = self.managers.for_path(&info.path) else {
            return Prepared::Done(TransformStatus::failure(format!("no document manager for {}", info.path)));
        };
        let backend = match self.backend(&info.path) {
            Ok(backend) => backend.clone(),
            Err(e) => return Prepared::Done(TransformStatus::failure((*e).to_string())),
        };
        let stamp = catalog.ledger.get(guid, profile);
        let run_process = flags.force || stamp.is_none_or(|stamp| stamp.failed || stamp.asset_hash != info.asset_hash);
        let run_thumbnail = info.descriptor.flags.supports_thumbnail
            && info.missing_thumbnail_deps.is_empty()
            && (run_process || stamp.is_none_or(|stamp| stamp.thumb_hash != Some(info.thumb_hash)));
        let base = info.path.data_directory();
        let asset_dependencies = info
            .document
            .transform_dependencies
            .iter()
            .filter_map(|reference| match catalog.resolve(base, reference) {
                Resolved::Asset(dependency) => Some(dependency),
                _ => None,
            })
            .collect();
        Prepared::Run(Box::new(Job {
            request: TransformRequest {
                guid,
                path: info.path.clone(),
                document: info.document.clone(),
                profile: profile.to_string(),
                asset_hash: info.asset_hash,
                thumb_hash: info.thumb_hash,
                flags,
                backend,
            },
            manager: manager.clone(),
            asset_dependencies,
            run_process,
            run_thumbnail,
        }))
    }

    /// Bring `guid` up to date for `profile`, transforming its asset
    /// dependencies first.
    pub(crate) fn transform_asset<'a>(
        &'a self,
        guid: Guid,
        flags: TransformFlags,
        profile: &'a str,
        visiting: &'a mut Vec<Guid>,
    ) -> BoxFuture<'a, TransformStatus> {
        Box::pin(async move {
            if visiting.contains(&guid) {
                return TransformStatus::failure(format!("{guid} depends on itself"));
            }
            self.update_asset_transform_state(guid, false, &mut Vec::new()).await;
            let job = match self.prepare_transform(guid, flags, profile) {
                Prepared::Done(status) => return status,
                Prepared::Run(job) => job,
            };

            visiting.push(guid);
            // Dependencies are only brought up to date, never forced.
            let dependency_flags = TransformFlags { force: false, ..flags };
            for dependency in &job.asset_dependencies {
                let status = self.transform_asset(*dependency, dependency_flags, profile, visiting).await;
                if !status.is_success() {
                    visiting.pop();
                    let status = TransformStatus::failure(format!("dependency {dependency} not transformed: {status}"));
                    self.record_transform(&job.request, &status);
                    return status;
                }
            }
            visiting.pop();

            let request = &job.request;
            let mut status = TransformStatus::success();
            if job.run_process {
                tracing::info!(%guid, path = %request.path, profile, "transforming asset");
                status = AssertUnwindSafe(job.manager.process(request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| TransformStatus::failure("document manager panicked"));
                self.record_transform(request, &status);
            }
            if job.run_thumbnail && status.is_success() {
                let thumbnail = AssertUnwindSafe(job.manager.create_thumbnail(request))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| TransformStatus::failure("document manager panicked"));
                let mut catalog = self.catalog();
                if thumbnail.is_success() {
                    catalog.ledger.record_thumbnail(guid, profile, request.thumb_hash);
                } else {
                    tracing::warn!(%guid, path = %request.path, %thumbnail, "thumbnail creation failed");
                    catalog.append_log(guid, LogEntry::warning(format!("thumbnail: {thumbnail}")));
                }
            }
            self.catalog().refresh_state(guid);
            status
        })
    }

    fn record_transform(&self, request: &TransformRequest, status: &TransformStatus) {
        let mut catalog = self.catalog();
        let current = catalog.registry.get(&request.guid).map(|info| info.asset_hash);
        if current != Some(request.asset_hash) {
            // Changed while transforming; the stamp would describe stale inputs.
            tracing::debug!(guid = %request.guid, "asset changed during transform, not recording result");
            return;
        }
        match status.result {
            TransformResult::Success => {
                catalog.ledger.record_success(request.guid, &request.profile, request.asset_hash);
                catalog.append_log(request.guid, LogEntry::info(format!("transformed for {}", request.profile)));
            },
            TransformResult::Failure => {
                tracing::warn!(guid = %request.guid, path = %request.path, %status, "transform failed");
                catalog.ledger.record_failure(request.guid, &request.profile, request.asset_hash);
                catalog.append_log(request.guid, LogEntry::error(status.to_string()));
            },
            TransformResult::NeedsImport => {},
        }
    }

    pub(crate) async fn transform_all_assets(&self, flags: TransformFlags, profile: &str) -> TransformSummary {
        let mut summary = TransformSummary::default();
        let guids = self.catalog().registry.guids();
        for guid in guids {
            self.update_asset_transform_state(guid, false, &mut Vec::new()).await;
            let state = self.catalog().state_for_profile(guid, profile);
            if !flags.force && state == Some(TransformState::UpToDate) {
                summary.skipped += 1;
                continue;
            }
            let status = self.transform_asset(guid, flags, profile, &mut Vec::new()).await;
            if status.is_success() {
                summary.transformed += 1;
            } else {
                summary.failed += 1;
                summary.failures.push((guid, status));
            }
        }
        tracing::info!(
            profile,
            transformed = summary.transformed,
            failed = summary.failed,
            skipped = summary.skipped,
            "transformed assets"
        );
        summary
    }
}
