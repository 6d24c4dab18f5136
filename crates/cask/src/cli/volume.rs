//! `cask volume` subcommands.

use clap::Subcommand;
use color_eyre::eyre::{Result, bail};
use dialoguer::Confirm;

use cask_volume::{FilterSet, completion};

use super::Context;
use crate::format::{self, OutputFormat, Template, VolumeView};

/// Volume commands.
#[derive(Subcommand)]
pub enum VolumeCommand {
    /// Create a volume
    Create {
        /// Set metadata on the volume (KEY=VALUE)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Volume name; a random name is generated when omitted
        name: Option<String>,
    },

    /// Display detailed information on one or more volumes
    Inspect {
        /// Compute the size of each volume
        #[arg(short, long)]
        size: bool,

        /// Format output using a template
        #[arg(short, long)]
        format: Option<String>,

        /// Volume names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List volumes
    #[command(alias = "list")]
    Ls {
        /// Only display volume names
        #[arg(short, long)]
        quiet: bool,

        /// Compute the size of each volume
        #[arg(short, long)]
        size: bool,

        /// Filter output (name=, label=, size<op>)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Output format (table, wide, json or a template)
        #[arg(long)]
        format: Option<String>,
    },

    /// Remove one or more volumes
    #[command(alias = "remove")]
    Rm {
        /// Do not report volumes that do not exist
        #[arg(short, long)]
        force: bool,

        /// Volume names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Remove unused volumes
    Prune {
        /// Remove all unused volumes, not just anonymous ones
        #[arg(short, long)]
        all: bool,

        /// Do not prompt for confirmation
        #[arg(short, long)]
        force: bool,

        /// Filter the volumes to remove
        #[arg(long = "filter")]
        filters: Vec<String>,
    },

    /// List volume names for shell completion
    #[command(hide = true)]
    Names {
        /// Only names starting with this prefix
        prefix: Option<String>,
    },
}

impl VolumeCommand {
    /// Execute the volume command.
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let service = ctx.service()?;
        // Prune takes the lock after its prompt.
        let _guard = if matches!(self, Self::Prune { .. }) {
            None
        } else {
            ctx.deadline_lock(service.store())?
        };

        match self {
            Self::Create { labels, name } => {
                let volume = service.create(name.as_deref(), &labels)?;
                println!("{}", volume.name);
                Ok(())
            }

            Self::Inspect {
                size,
                format,
                names,
            } => {
                let (volumes, errors) = service.inspect(&names, size);

                match format.as_deref().map(str::trim) {
                    None | Some("" | "json") => {
                        let views: Vec<VolumeView> = volumes.iter().map(VolumeView::from).collect();
                        println!("{}", serde_json::to_string_pretty(&views)?);
                    }
                    Some(template) => {
                        let template = Template::parse(template)?;
                        for volume in &volumes {
                            println!("{}", template.render(&VolumeView::from(volume))?);
                        }
                    }
                }

                for err in &errors {
                    eprintln!("Error: {err}");
                }
                if !errors.is_empty() {
                    bail!("{} of {} volumes could not be inspected", errors.len(), names.len());
                }
                Ok(())
            }

            Self::Ls {
                quiet,
                size,
                filters,
                format,
            } => {
                let filters = FilterSet::parse(&filters)?;
                let output = OutputFormat::parse(format.as_deref())?;
                let volumes = service.list(&filters, size)?;

                if quiet {
                    for volume in &volumes {
                        println!("{}", volume.name);
                    }
                } else {
                    let show_size = size || filters.needs_size();
                    print!("{}", format::render_lines(&volumes, &output, show_size)?);
                }
                Ok(())
            }

            Self::Rm { force, names } => {
                let report = service.remove(&names, force);

                for name in &report.removed {
                    println!("{name}");
                }
                for warning in &report.warnings {
                    eprintln!("Error: {warning}");
                }
                if let Some(fatal) = report.fatal {
                    return Err(fatal.into());
                }
                if !report.warnings.is_empty() {
                    bail!("{} of {} volumes could not be removed", report.warnings.len(), names.len());
                }
                Ok(())
            }

            Self::Prune {
                all,
                force,
                filters,
            } => {
                let filters = FilterSet::parse(&filters)?;

                if !force {
                    let scope = if all { "all local volumes" } else { "anonymous local volumes" };
                    eprintln!("WARNING! This will remove {scope} not used by at least one container.");
                    let confirmed = Confirm::new()
                        .with_prompt("Are you sure you want to continue?")
                        .default(false)
                        .interact()?;
                    if !confirmed {
                        return Ok(());
                    }
                }

                let _guard = ctx.deadline_lock(service.store())?;
                let removed = service.prune(all, &filters)?;
                if !removed.is_empty() {
                    println!("Deleted Volumes:");
                    for name in &removed {
                        println!("{name}");
                    }
                }
                tracing::info!(count = removed.len(), namespace = %ctx.namespace, "Pruned volumes");
                Ok(())
            }

            Self::Names { prefix } => {
                let names = completion::volume_names_with_prefix(
                    service.store(),
                    prefix.as_deref().unwrap_or_default(),
                )?;
                for name in names {
                    println!("{name}");
                }
                Ok(())
            }
        }
    }
}
