use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    complete_submission, load_settings, BpsHttpClient, BpsWizard, RosterSource, SelectionMode,
    SubmissionEngine, SubmissionEvent, SubmissionOutcome,
};
use shared::domain::{BranchId, DisciplineItemId, Polarity, StudentId};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bps", about = "Record behavior points for students")]
struct Cli {
    /// TOML settings file; defaults to ./bps.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    branch_id: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List students grouped by classroom.
    Roster {
        #[arg(long)]
        search: Option<String>,
    },
    /// List the behaviors offered for one polarity.
    Catalog {
        #[arg(long)]
        polarity: Polarity,
    },
    /// Record every listed behavior for every listed student.
    Submit {
        #[arg(long = "student", required = true)]
        students: Vec<String>,
        #[arg(long = "behavior", required = true)]
        behaviors: Vec<String>,
        #[arg(long, default_value = "")]
        note: String,
        /// Refresh branch data even if some records failed.
        #[arg(long)]
        confirm_partial: bool,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(server_url) = cli.server_url {
        settings.server_url = server_url;
    }
    if let Some(token) = cli.token {
        settings.auth_token = Some(token);
    }
    if let Some(branch_id) = cli.branch_id {
        settings.branch_id = Some(branch_id);
    }
    let branch_id = BranchId::new(
        settings
            .branch_id
            .clone()
            .context("no branch configured; pass --branch-id or set BPS_BRANCH_ID")?,
    );

    let client = Arc::new(BpsHttpClient::from_settings(&settings)?);
    info!("using server {}", client.server_url());

    match cli.command {
        Command::Roster { search } => {
            let mut wizard = BpsWizard::open(client.as_ref(), &branch_id).await?;
            if let Some(search) = search {
                wizard.set_search_query(search);
            }
            let groups = wizard.visible_groups();
            for class_name in wizard.visible_class_names() {
                println!("{class_name}");
                for student in groups.get(&class_name).into_iter().flatten() {
                    println!("  {:<12} {}", student.student_id, student.name);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Catalog { polarity } => {
            let branch = client.fetch_branch(&branch_id).await?;
            for item in client_core::catalog::resolve_catalog(Some(&branch), polarity) {
                println!(
                    "{:<16} {:>+4}  {}",
                    item.discipline_item_id, item.item_point, item.item_title
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Submit {
            students,
            behaviors,
            note,
            confirm_partial,
            json,
        } => {
            let mut wizard = BpsWizard::open(client.as_ref(), &branch_id).await?;
            select(&mut wizard, &students, &behaviors, note)?;
            let review = wizard
                .state()
                .review()
                .context("selection did not reach the review step")?;
            println!(
                "submitting {} record(s): {} point(s) per student, {} total",
                review.request_count, review.points_per_student, review.grand_total
            );

            let engine = SubmissionEngine::new(client.clone());
            let mut events = engine.subscribe_events();
            let progress = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        SubmissionEvent::PairFailed { index, failure } => eprintln!(
                            "  #{} {} / {}: {}",
                            index + 1,
                            failure.student_name,
                            failure.behavior_title,
                            failure.message
                        ),
                        SubmissionEvent::Finished { .. } => break,
                        _ => {}
                    }
                }
            });

            let result =
                complete_submission(&engine, client.as_ref(), &mut wizard, confirm_partial)
                    .await?;
            let _ = progress.await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!(
                    "{:?}: {} of {} record(s) stored",
                    result.outcome(),
                    result.success_count,
                    result.total_expected
                );
            }

            Ok(match result.outcome() {
                SubmissionOutcome::AllSucceeded => ExitCode::SUCCESS,
                SubmissionOutcome::PartialSuccess
                | SubmissionOutcome::AllFailed
                | SubmissionOutcome::Cancelled => ExitCode::FAILURE,
            })
        }
    }
}

/// Walks the wizard through steps 1 and 2 using ids from the command line.
fn select(
    wizard: &mut BpsWizard,
    student_ids: &[String],
    behavior_ids: &[String],
    note: String,
) -> Result<()> {
    if student_ids.len() > 1 {
        wizard.state_mut().set_student_mode(SelectionMode::Multiple);
    }
    for id in student_ids {
        let Some(student) = wizard.find_student(&StudentId::new(id.as_str())).cloned() else {
            bail!("student {id} is not on this branch's roster");
        };
        if !wizard.state().is_student_selected(&student.student_id) {
            wizard.state_mut().toggle_student(student);
        }
    }
    if !wizard.state_mut().next() {
        bail!("no students selected");
    }

    for id in behavior_ids {
        let Some(item) = wizard.find_behavior(&DisciplineItemId::new(id.as_str())) else {
            bail!("behavior {id} is not in this branch's catalog");
        };
        if let Some(polarity) = item.polarity() {
            wizard.state_mut().select_polarity(polarity);
        }
        if !wizard.state().is_behavior_selected(&item.discipline_item_id) {
            wizard.state_mut().toggle_behavior(item);
        }
    }
    wizard.state_mut().set_note(note);
    if !wizard.state_mut().next() {
        bail!("no behaviors selected");
    }
    Ok(())
}
