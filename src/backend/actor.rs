//! Backend orchestration actor
//!
//! Owns every component and serializes work: commands are processed one at
//! a time, so at most one pipeline run is ever active and the shared tool
//! path is never provisioned out from under a running retrieval.

use crate::backend::bridge::ProgressBridge;
use crate::backend::messages::BackendCommand;
use crate::pipeline::runner::DownloadPipeline;
use crate::retriever::Retriever;
use crate::tool::ToolProvisioner;
use crate::update::{ReleaseChecker, SelfUpdater, UpdateDecision};
use crate::utils::config::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

pub struct BackendActor {
    receiver: mpsc::Receiver<BackendCommand>,
    bridge: ProgressBridge,
    session: Session,
    pipeline: DownloadPipeline,
    provisioner: Arc<ToolProvisioner>,
    checker: ReleaseChecker,
    updater: SelfUpdater,
}

impl BackendActor {
    pub fn new(
        session: Session,
        retriever: Arc<dyn Retriever>,
        receiver: mpsc::Receiver<BackendCommand>,
        bridge: ProgressBridge,
    ) -> Self {
        let provisioner = Arc::new(ToolProvisioner::new(
            session.settings.tool_dir.clone(),
            session.settings.tool_archive_url.clone(),
        ));

        let checker = ReleaseChecker::new(
            session.settings.release_feed_url.clone(),
            &session.settings.update_state_file,
            Duration::from_secs(session.settings.update_check_interval_secs),
        );

        let pipeline = DownloadPipeline::new(
            provisioner.clone(),
            retriever,
            session.clone(),
            bridge.clone(),
        );

        Self {
            receiver,
            bridge,
            session,
            pipeline,
            provisioner,
            checker,
            updater: SelfUpdater::new(),
        }
    }

    pub async fn run(mut self) {
        info!("Backend actor started");

        // Startup sequence: throttled release check, then tool warmup. Both
        // degrade gracefully; neither blocks download submissions that
        // arrive afterwards.
        self.check_for_updates().await;
        self.warm_up_tool().await;

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                BackendCommand::SubmitDownload(request) => {
                    // Awaited inline: submissions are serialized.
                    self.pipeline.run(request).await;
                }
                BackendCommand::CheckForUpdates => {
                    self.check_for_updates().await;
                }
                BackendCommand::ApplyUpdate(release) => {
                    let bridge = self.bridge.clone();
                    let mut last_pct: i64 = -1;
                    let result = self
                        .updater
                        .apply(&release, move |done, total| {
                            if let Some(total) = total {
                                if total > 0 {
                                    let pct = (done * 100 / total) as i64;
                                    if pct != last_pct {
                                        last_pct = pct;
                                        bridge.log(format!("Downloading update... {}%", pct));
                                    }
                                }
                            }
                        })
                        .await;

                    match result {
                        Ok(staged) => {
                            self.bridge.update_staged(staged.version);
                            // The swap script waits on our exit.
                            break;
                        }
                        Err(e) => {
                            self.bridge.log(format!("Failed to install update: {}", e));
                        }
                    }
                }
                BackendCommand::Shutdown => {
                    info!("Backend actor shutting down");
                    break;
                }
            }
        }
    }

    async fn check_for_updates(&self) {
        self.bridge.log("Checking for application updates...");
        match self.checker.check(&self.session.current_version).await {
            UpdateDecision::UpdateAvailable(release) => {
                self.bridge
                    .log(format!("Version {} is available", release.version()));
                self.bridge.update_available(release);
            }
            UpdateDecision::UpToDate => {
                self.bridge.log("No updates available");
            }
        }
    }

    async fn warm_up_tool(&self) {
        if let Err(e) = self.provisioner.ensure_ready(&self.bridge).await {
            self.bridge
                .log(format!("Media toolchain is not ready: {}", e));
        }
    }
}
