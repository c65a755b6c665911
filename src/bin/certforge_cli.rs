//! CertForge CLI - Bridge interface for the web tier
//!
//! Commands: templates, get-template, save-template, preview, status,
//! progress, review, unlock, approve, bulk-unlock, generate
//! Outputs JSON to stdout (logs go to stderr)
//! Returns non-zero on validation or eligibility failure

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use certforge_core::{
    eligibility::ProjectStatus,
    substitution::SubstitutionContext,
    templates::{CertificateType, Template, TemplateStore},
    CertificateEngine, EligibilityLedger,
};

#[derive(Parser)]
#[command(name = "certforge-cli")]
#[command(about = "CertForge CLI - Certificate Issuance Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the data directory (templates + eligibility ledger)
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved templates
    Templates,

    /// Print one saved template
    GetTemplate {
        /// Certificate type (completion|lor|offer)
        #[arg(short, long)]
        cert_type: String,
    },

    /// Validate and save a template
    SaveTemplate {
        #[arg(short, long)]
        cert_type: String,

        /// JSON payload (Template)
        #[arg(short, long)]
        payload: String,
    },

    /// Assemble a template with sample context, no eligibility involved
    Preview {
        /// JSON payload (Template)
        #[arg(short, long)]
        payload: String,

        /// JSON payload (SubstitutionContext)
        #[arg(short = 'x', long, default_value = "{}")]
        context: String,
    },

    /// Current eligibility status for a student
    Status {
        #[arg(short, long)]
        student: String,

        #[arg(short, long)]
        cert_type: String,
    },

    /// Record a course completion percentage
    Progress {
        #[arg(short, long)]
        student: String,

        #[arg(short, long)]
        cert_type: String,

        #[arg(short, long)]
        percentage: u8,
    },

    /// Record a project review outcome
    Review {
        #[arg(short, long)]
        student: String,

        #[arg(short, long)]
        cert_type: String,

        /// not_started|in_progress|completed|excellent
        #[arg(short = 'o', long)]
        outcome: String,
    },

    /// Unlock a certificate for one student
    Unlock {
        #[arg(short, long)]
        student: String,

        #[arg(short, long)]
        cert_type: String,
    },

    /// Grant admin approval (does not unlock by itself)
    Approve {
        #[arg(short, long)]
        student: String,

        #[arg(short, long)]
        cert_type: String,
    },

    /// Unlock for many students, reporting the full partition
    BulkUnlock {
        #[arg(short, long)]
        cert_type: String,

        /// Comma-separated student ids
        #[arg(short, long)]
        students: String,
    },

    /// Issue a certificate for an unlocked student
    Generate {
        #[arg(short, long)]
        student: String,

        #[arg(short, long)]
        cert_type: String,

        /// JSON payload (SubstitutionContext)
        #[arg(short = 'x', long, default_value = "{}")]
        context: String,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let templates_dir = cli.data_dir.join("templates");
    let ledger_path = cli.data_dir.join("eligibility.json");

    let templates = match TemplateStore::load_from_dir(&templates_dir) {
        Ok(t) => t,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load templates: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };
    let ledger = match EligibilityLedger::load_from_file(&ledger_path) {
        Ok(l) => l,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to load eligibility ledger: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    };
    let engine = CertificateEngine::new(templates, ledger);

    match cli.command {
        Commands::Templates => {
            let templates: Vec<_> = CertificateType::ALL
                .iter()
                .filter_map(|&t| engine.templates().get(t))
                .map(|t| {
                    serde_json::json!({
                        "certificateType": t.certificate_type,
                        "orientation": t.orientation,
                        "elementCount": t.elements.len(),
                        "schemaVersion": t.schema_version,
                    })
                })
                .collect();

            println!("{}", serde_json::to_string_pretty(&templates).unwrap());
            ExitCode::SUCCESS
        }

        Commands::GetTemplate { cert_type } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            match engine.get_template(cert_type) {
                Ok(template) => {
                    println!("{}", serde_json::to_string_pretty(&template).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"error": "{}"}}"#, e);
                    ExitCode::FAILURE
                }
            }
        }

        Commands::SaveTemplate { cert_type, payload } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            let template: Template = match serde_json::from_str(&payload) {
                Ok(t) => t,
                Err(e) => {
                    println!(r#"{{"saved": false, "error": "Invalid payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match engine.save_template(cert_type, template) {
                Ok(()) => {
                    if let Err(e) = engine.templates().persist_to_dir(&templates_dir) {
                        eprintln!(r#"{{"error": "Failed to persist templates: {}"}}"#, e);
                        return ExitCode::FAILURE;
                    }
                    println!(r#"{{"saved": true}}"#);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(
                        r#"{{"saved": false, "error": "{}"}}"#,
                        e
                    );
                    ExitCode::from(2) // Validation failure
                }
            }
        }

        Commands::Preview { payload, context } => {
            let template: Template = match serde_json::from_str(&payload) {
                Ok(t) => t,
                Err(e) => {
                    println!(r#"{{"error": "Invalid template payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };
            let context: SubstitutionContext = match serde_json::from_str(&context) {
                Ok(c) => c,
                Err(e) => {
                    println!(r#"{{"error": "Invalid context payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match engine.render_preview(&template, &context) {
                Ok(document) => {
                    println!("{}", serde_json::to_string_pretty(&document).unwrap());
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    println!(r#"{{"error": "{}"}}"#, e);
                    ExitCode::from(2)
                }
            }
        }

        Commands::Status { student, cert_type } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            let record = engine.ledger().record(&student, cert_type);
            let output = serde_json::json!({
                "status": record.status(),
                "record": record,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
            ExitCode::SUCCESS
        }

        Commands::Progress {
            student,
            cert_type,
            percentage,
        } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            engine.record_progress(&student, cert_type, percentage);
            println!(
                r#"{{"recorded": true, "status": "{}"}}"#,
                engine.get_status(&student, cert_type)
            );
            persist_ledger(&engine, &ledger_path)
        }

        Commands::Review {
            student,
            cert_type,
            outcome,
        } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            let outcome: ProjectStatus =
                match serde_json::from_value(serde_json::Value::String(outcome)) {
                    Ok(o) => o,
                    Err(e) => {
                        println!(r#"{{"error": "Invalid outcome: {}"}}"#, e);
                        return ExitCode::FAILURE;
                    }
                };
            engine.record_project_review(&student, cert_type, outcome);
            println!(
                r#"{{"recorded": true, "status": "{}"}}"#,
                engine.get_status(&student, cert_type)
            );
            persist_ledger(&engine, &ledger_path)
        }

        Commands::Unlock { student, cert_type } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            match engine.unlock(&student, cert_type) {
                Ok(outcome) => {
                    println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
                    persist_ledger(&engine, &ledger_path)
                }
                Err(e) => {
                    println!(r#"{{"error": "{}"}}"#, e);
                    ExitCode::from(2)
                }
            }
        }

        Commands::Approve { student, cert_type } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            engine.approve(&student, cert_type);
            println!(
                r#"{{"approved": true, "status": "{}"}}"#,
                engine.get_status(&student, cert_type)
            );
            persist_ledger(&engine, &ledger_path)
        }

        Commands::BulkUnlock {
            cert_type,
            students,
        } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            let ids: Vec<String> = students
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            let report = engine.bulk_unlock(&ids, cert_type);
            println!("{}", serde_json::to_string_pretty(&report).unwrap());
            persist_ledger(&engine, &ledger_path)
        }

        Commands::Generate {
            student,
            cert_type,
            context,
        } => {
            let cert_type = match parse_type(&cert_type) {
                Ok(t) => t,
                Err(code) => return code,
            };
            let context: SubstitutionContext = match serde_json::from_str(&context) {
                Ok(c) => c,
                Err(e) => {
                    println!(r#"{{"error": "Invalid context payload: {}"}}"#, e);
                    return ExitCode::FAILURE;
                }
            };

            match engine.generate(&student, cert_type, &context) {
                Ok(issued) => {
                    let output = serde_json::json!({
                        "success": true,
                        "certificate": issued,
                    });
                    println!("{}", serde_json::to_string_pretty(&output).unwrap());
                    persist_ledger(&engine, &ledger_path)
                }
                Err(e) => {
                    let output = serde_json::json!({
                        "success": false,
                        "error": e.to_string(),
                    });
                    println!("{}", serde_json::to_string(&output).unwrap());
                    ExitCode::from(2) // Eligibility or assembly failure
                }
            }
        }
    }
}

fn parse_type(s: &str) -> Result<CertificateType, ExitCode> {
    CertificateType::parse(s).ok_or_else(|| {
        println!(
            r#"{{"error": "Unknown certificate type: {} (expected completion|lor|offer)"}}"#,
            s
        );
        ExitCode::FAILURE
    })
}

fn persist_ledger(engine: &CertificateEngine, path: &std::path::Path) -> ExitCode {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            eprintln!(r#"{{"error": "Failed to create data dir: {}"}}"#, e);
            return ExitCode::FAILURE;
        }
    }
    match engine.ledger().persist_to_file(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to persist ledger: {}"}}"#, e);
            ExitCode::FAILURE
        }
    }
}
