//! `cask container` subcommands.
//!
//! Records containers and their mounts so volume usage can be tracked. No
//! process is started.

use clap::Subcommand;
use color_eyre::eyre::{Result, bail};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use cask_common::{CaskError, CaskResult};
use cask_mount::{MountParser, Processed, ProcMounts, encode_mount_labels};
use cask_oci::{ContainerState, Spec};
use cask_volume::usage::MOUNTS_LABEL;
use cask_volume::{MountPoint, VolumeStore};

use super::Context;
use crate::containers::StateDir;

/// Container commands.
#[derive(Subcommand)]
pub enum ContainerCommand {
    /// Record a container and resolve its mounts
    Create {
        /// Remove the container's anonymous volumes along with it
        #[arg(long)]
        rm: bool,

        /// Bind mount or volume ([SRC:]DST[:OPTS])
        #[arg(short = 'v', long = "volume")]
        volumes: Vec<String>,

        /// Mount specification (type=...,src=...,dst=...)
        #[arg(long = "mount")]
        mounts: Vec<String>,

        /// tmpfs mount (DST[:OPTS])
        #[arg(long)]
        tmpfs: Vec<String>,

        /// Container ID
        container_id: String,
    },

    /// Remove container records
    #[command(alias = "remove")]
    Rm {
        /// Remove the anonymous volumes of the container
        #[arg(short = 'v', long = "volumes")]
        volumes: bool,

        /// Container IDs
        #[arg(required = true)]
        container_ids: Vec<String>,
    },

    /// List container records
    #[command(alias = "list")]
    Ls {
        /// Only display container IDs
        #[arg(short, long)]
        quiet: bool,
    },
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "CONTAINER ID")]
    id: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "MOUNTS")]
    mounts: String,
}

/// Flags of `container create` that produce mounts.
struct MountFlags<'a> {
    volumes: &'a [String],
    mounts: &'a [String],
    tmpfs: &'a [String],
}

impl MountFlags<'_> {
    fn resolve(&self, parser: &MountParser<'_>, created: &mut Vec<String>) -> CaskResult<Vec<Processed>> {
        let mut processed = Vec::new();
        for raw in self.volumes {
            processed.push(parser.process_flag_v(raw, true)?);
            created.extend(processed.last().and_then(|p| p.anonymous_volume.clone()));
        }
        for raw in self.mounts {
            processed.push(parser.process_flag_mount(raw)?);
            created.extend(processed.last().and_then(|p| p.anonymous_volume.clone()));
        }
        for raw in self.tmpfs {
            processed.push(parser.process_flag_tmpfs(raw)?);
        }
        Ok(processed)
    }
}

/// Write the state and spec of a newly created container.
fn record(states: &StateDir, container_id: &str, auto_remove: bool, processed: &[Processed]) -> CaskResult<()> {
    let mut spec = Spec::default();
    for mount in processed {
        mount.apply(&mut spec);
    }

    let mut state = ContainerState::new(container_id);
    state.labels = encode_mount_labels(processed)?;
    state.auto_remove = auto_remove;
    state.bundle = states.container_dir(container_id)?;
    states.save_spec(container_id, &spec)?;
    states.save(&state)
}

fn discard_anonymous(store: &VolumeStore, created: Vec<String>) {
    if created.is_empty() {
        return;
    }
    let report = store.remove(|| Ok((created, Vec::new())));
    for warning in report.warnings.iter().chain(report.fatal.as_ref()) {
        tracing::warn!(%warning, "Failed to discard anonymous volume");
    }
}

impl ContainerCommand {
    /// Execute the container command.
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let states = ctx.states();

        match self {
            Self::Create {
                rm,
                volumes,
                mounts,
                tmpfs,
                container_id,
            } => {
                let store = ctx.store()?;
                // Held until the state is saved so prune cannot collect the
                // new anonymous volumes first.
                let _guard = ctx.lock(&store)?;
                if states.exists(&container_id)? {
                    return Err(CaskError::AlreadyExists {
                        name: format!("container {container_id}"),
                    }
                    .into());
                }

                let host = ProcMounts;
                let parser = MountParser::new(&store, &host);
                let flags = MountFlags {
                    volumes: &volumes,
                    mounts: &mounts,
                    tmpfs: &tmpfs,
                };

                let mut created = Vec::new();
                let processed = match flags.resolve(&parser, &mut created) {
                    Ok(processed) => processed,
                    Err(err) => {
                        discard_anonymous(&store, created);
                        return Err(err.into());
                    }
                };

                if let Err(err) = record(&states, &container_id, rm, &processed) {
                    if let Err(cleanup) = states.delete(&container_id) {
                        tracing::warn!(container_id = %container_id, %cleanup, "Failed to remove partial container record");
                    }
                    discard_anonymous(&store, created);
                    return Err(err.into());
                }

                tracing::info!(container_id = %container_id, mounts = processed.len(), "Container recorded");
                println!("{container_id}");
                Ok(())
            }

            Self::Rm {
                volumes,
                container_ids,
            } => {
                let service = ctx.service()?;
                let _guard = ctx.deadline_lock(service.store())?;
                let mut failed = 0usize;

                for container_id in &container_ids {
                    let state = match states.load(container_id) {
                        Ok(state) => state,
                        Err(err) => {
                            eprintln!("Error: {err}");
                            failed += 1;
                            continue;
                        }
                    };

                    let report = service.release_container(&state, volumes);
                    for warning in &report.warnings {
                        tracing::warn!(container_id = %container_id, %warning, "Kept anonymous volume");
                    }
                    if let Some(fatal) = report.fatal {
                        eprintln!("Error: {fatal}");
                        failed += 1;
                        continue;
                    }

                    states.delete(container_id)?;
                    println!("{container_id}");
                }

                if failed > 0 {
                    bail!("{failed} of {} containers could not be removed", container_ids.len());
                }
                Ok(())
            }

            Self::Ls { quiet } => {
                let ids = states.list()?;
                if quiet {
                    for container_id in ids {
                        println!("{container_id}");
                    }
                    return Ok(());
                }

                let mut rows = Vec::new();
                for container_id in ids {
                    let state = match states.load(&container_id) {
                        Ok(state) => state,
                        Err(err) => {
                            tracing::warn!(container_id = %container_id, %err, "Skipping unreadable container");
                            continue;
                        }
                    };
                    let mounts: Vec<MountPoint> = state
                        .labels
                        .get(MOUNTS_LABEL)
                        .and_then(|raw| serde_json::from_str(raw).ok())
                        .unwrap_or_default();
                    rows.push(ContainerRow {
                        id: state.id,
                        status: state.status.to_string(),
                        mounts: mounts
                            .iter()
                            .map(|mount| mount.destination.as_str())
                            .collect::<Vec<_>>()
                            .join(","),
                    });
                }

                let mut table = Table::new(rows);
                table.with(Style::blank());
                println!("{table}");
                Ok(())
            }
        }
    }
}
