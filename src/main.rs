mod ai;
mod analyzers;
mod config;
mod errors;
mod exporter;
mod logging;
mod markdown;
mod models;
mod repository;
mod scrape;
mod service;
mod tui;
mod writer;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use analyzers::{LlmCvAnalyzer, LlmCvOptimizer, LlmJobPostingAnalyzer};
use config::{ConfigLoader, Settings};
use errors::CvJointError;
use exporter::MarkdownExporter;
use repository::{Collection, FileSystemRepository};
use service::ApplicationService;
use writer::MarkdownWriter;

#[derive(Parser)]
#[command(name = "cvjoint")]
#[command(about = "Analyze job postings and CVs, and tailor CVs to jobs")]
struct Cli {
    /// Print the merged configuration and exit
    #[arg(long)]
    show_config: bool,

    /// Rewrite markdown mirrors of one collection (job-postings, cvs) or all
    #[arg(long, value_name = "COLLECTION", num_args = 0..=1)]
    regenerate_markdown: Option<Option<String>>,

    /// Delete markdown mirrors of everything, one collection, or one record
    #[arg(long, value_names = ["COLLECTION", "IDENTIFIER"], num_args = 0..=2)]
    clear_markdown: Option<Vec<String>>,

    /// Data directory (overrides the configured one)
    #[arg(long, global = true)]
    data_dir: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze and manage job postings
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Analyze and manage CVs
    Cv {
        #[command(subcommand)]
        command: CvCommands,
    },

    /// Tailor a saved CV to a saved job posting
    Optimize {
        /// Job posting identifier
        job_id: String,

        /// Base CV identifier
        cv_id: String,

        /// Save the result right away
        #[arg(long)]
        save: bool,
    },

    /// Manage CV optimizations
    Optimization {
        #[command(subcommand)]
        command: OptimizationCommands,
    },

    /// Browse saved job postings and CVs in the terminal
    Browse,
}

#[derive(Subcommand)]
enum JobCommands {
    /// Extract a structured job posting from a URL
    Analyze {
        /// Job posting URL
        url: String,

        /// Read the posting from this file instead of fetching the URL
        #[arg(long)]
        content_file: Option<PathBuf>,

        /// Save the result
        #[arg(long)]
        save: bool,

        /// Identifier to save under instead of the suggested one
        #[arg(long = "as", value_name = "ID", requires = "save")]
        identifier: Option<String>,
    },

    /// List saved job postings
    List,

    /// Show a saved job posting as markdown
    Show {
        /// Job posting identifier
        id: String,
    },

    /// Remove a job posting from the index (files stay on disk)
    Remove {
        /// Job posting identifier
        id: String,
    },
}

#[derive(Subcommand)]
enum CvCommands {
    /// Extract a structured CV from a file (JSON, YAML, or text)
    Analyze {
        /// Path to the CV file
        file: PathBuf,

        /// Save the result
        #[arg(long)]
        save: bool,

        /// Identifier to save under instead of the suggested one
        #[arg(long = "as", value_name = "ID", requires = "save")]
        identifier: Option<String>,
    },

    /// List saved CVs
    List,

    /// Show a saved CV as markdown
    Show {
        /// CV identifier
        id: String,
    },

    /// Remove a CV from the index (files stay on disk)
    Remove {
        /// CV identifier
        id: String,
    },
}

#[derive(Subcommand)]
enum OptimizationCommands {
    /// List saved optimizations
    List {
        /// Only optimizations of this job posting
        #[arg(long)]
        job: Option<String>,
    },

    /// Show a saved optimization with its plan and CV
    Show {
        /// Job posting identifier
        job_id: String,

        /// Optimization identifier
        id: String,
    },

    /// Save a finished optimization run and export its markdown
    Save {
        /// Job posting identifier
        job_id: String,

        /// Optimization identifier
        id: String,

        /// Base CV identifier
        cv_id: String,
    },

    /// Delete an optimization directory
    Purge {
        /// Job posting identifier
        job_id: String,

        /// Optimization identifier
        id: String,
    },
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("")
}

fn build_service(settings: &Settings, data_dir: Option<&str>) -> Result<ApplicationService> {
    let (data_dir, markdown_root) = match data_dir {
        Some(dir) => (dir, dir),
        None => (
            settings.repositories.filesystem.data_dir.as_str(),
            settings.markdown_writer.root_dir.as_str(),
        ),
    };
    let repository = FileSystemRepository::new(data_dir)?;
    let exporter = MarkdownExporter::new(MarkdownWriter::new(markdown_root)?);
    Ok(ApplicationService::new(repository, exporter))
}

/// Prints a markdown maintenance count. An unknown collection name goes to
/// stderr with exit status 1.
fn report_markdown_count(result: Result<usize>, verb: &str) -> Result<()> {
    match result {
        Ok(count) => {
            println!("{} {} markdown file(s)", verb, count);
            Ok(())
        }
        Err(e) => match e.downcast_ref::<CvJointError>() {
            Some(CvJointError::UnknownCollection(name)) => {
                eprintln!("Unknown collection: {}", name);
                std::process::exit(1);
            }
            _ => Err(e),
        },
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    dotenvy::dotenv().ok();

    let loader = ConfigLoader::new();
    if cli.show_config {
        print!("{}", config::to_yaml(&loader.load()?)?);
        return Ok(());
    }
    let settings = loader.load_settings()?;
    let service = build_service(&settings, cli.data_dir.as_deref())?;

    if let Some(collection) = &cli.regenerate_markdown {
        return report_markdown_count(service.regenerate_markdown(collection.as_deref()), "Regenerated");
    }

    if let Some(args) = &cli.clear_markdown {
        let collection = args.first().map(String::as_str);
        let identifier = args.get(1).map(String::as_str);
        return report_markdown_count(service.clear_markdown(collection, identifier), "Removed");
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Job { command } => match command {
            JobCommands::Analyze {
                url,
                content_file,
                save,
                identifier,
            } => {
                let service = service
                    .with_job_posting_analyzer(Box::new(LlmJobPostingAnalyzer::from_settings(&settings)?));
                let (data, suggested) = service.create_job_posting(&url, content_file.as_deref())?;
                if save {
                    let identifier = identifier.unwrap_or(suggested);
                    let metadata = service.save_job_posting(data, &identifier)?;
                    println!("Saved job posting as '{}'", field(&metadata, "identifier"));
                } else {
                    print_json(&data)?;
                    eprintln!("Suggested identifier: {} (re-run with --save to keep it)", suggested);
                }
            }

            JobCommands::List => {
                let records = service.get_job_postings()?;
                if records.is_empty() {
                    println!("No job postings saved.");
                } else {
                    println!("{:<40} {:<30} {:<20} {:<12}", "ID", "TITLE", "COMPANY", "LEVEL");
                    println!("{}", "-".repeat(105));
                    for record in &records {
                        println!(
                            "{:<40} {:<30} {:<20} {:<12}",
                            truncate(field(record, "identifier"), 38),
                            truncate(field(record, "title"), 28),
                            truncate(field(record, "company"), 18),
                            truncate(field(record, "experience_level"), 12),
                        );
                    }
                }
            }

            JobCommands::Show { id } => match service.get_markdown(Collection::JobPostings, &id)? {
                Some(markdown) => print!("{}", markdown),
                None => println!("Job posting '{}' not found.", id),
            },

            JobCommands::Remove { id } => {
                if service.remove_job_posting(&id)? {
                    println!("Removed job posting '{}' from the index.", id);
                } else {
                    println!("Job posting '{}' not found.", id);
                }
            }
        },

        Commands::Cv { command } => match command {
            CvCommands::Analyze {
                file,
                save,
                identifier,
            } => {
                let service = service.with_cv_analyzer(Box::new(LlmCvAnalyzer::from_settings(&settings)?));
                let (data, suggested) = service
                    .create_cv(&file)
                    .with_context(|| format!("Failed to analyze {}", file.display()))?;
                if save {
                    let identifier = identifier.unwrap_or(suggested);
                    let metadata = service.save_cv(data, &identifier)?;
                    println!("Saved CV as '{}'", field(&metadata, "identifier"));
                } else {
                    print_json(&data)?;
                    eprintln!("Suggested identifier: {} (re-run with --save to keep it)", suggested);
                }
            }

            CvCommands::List => {
                let records = service.get_cvs()?;
                if records.is_empty() {
                    println!("No CVs saved.");
                } else {
                    println!("{:<40} {:<25} {:<30}", "ID", "NAME", "PROFESSION");
                    println!("{}", "-".repeat(97));
                    for record in &records {
                        println!(
                            "{:<40} {:<25} {:<30}",
                            truncate(field(record, "identifier"), 38),
                            truncate(field(record, "name"), 23),
                            truncate(field(record, "profession"), 30),
                        );
                    }
                }
            }

            CvCommands::Show { id } => match service.get_markdown(Collection::Cvs, &id)? {
                Some(markdown) => print!("{}", markdown),
                None => println!("CV '{}' not found.", id),
            },

            CvCommands::Remove { id } => {
                if service.remove_cv(&id)? {
                    println!("Removed CV '{}' from the index.", id);
                } else {
                    println!("CV '{}' not found.", id);
                }
            }
        },

        Commands::Optimize { job_id, cv_id, save } => {
            let service = service.with_cv_optimizer(Box::new(LlmCvOptimizer::from_settings(&settings)?));
            let result = service.create_cv_optimization(&job_id, &cv_id)?;
            let identifier = field(&result, "identifier").to_string();
            if save {
                service.save_cv_optimization(&job_id, &identifier, &cv_id)?;
                println!("Saved optimization '{}' for job posting '{}'", identifier, job_id);
                println!(
                    "  {}",
                    service.repository().cv_optimization_dir(&job_id, &identifier).display()
                );
            } else {
                print_json(&result)?;
                eprintln!(
                    "Not saved. Keep it with: cvjoint optimization save {} {} {}",
                    job_id, identifier, cv_id
                );
            }
        }

        Commands::Optimization { command } => match command {
            OptimizationCommands::List { job } => {
                let optimizations = service.get_cv_optimizations(job.as_deref())?;
                if optimizations.is_empty() {
                    println!("No optimizations saved.");
                } else {
                    println!("{:<35} {:<20} {:<25} {:<30}", "JOB POSTING", "ID", "BASE CV", "TARGET");
                    println!("{}", "-".repeat(113));
                    for opt in &optimizations {
                        let target = match (opt["job_title"].as_str(), opt["company"].as_str()) {
                            (Some(title), Some(company)) => format!("{} at {}", title, company),
                            (Some(title), None) => title.to_string(),
                            _ => "-".to_string(),
                        };
                        println!(
                            "{:<35} {:<20} {:<25} {:<30}",
                            truncate(field(opt, "job_posting_identifier"), 33),
                            field(opt, "identifier"),
                            truncate(field(opt, "base_cv_identifier"), 23),
                            truncate(&target, 30),
                        );
                    }
                }
            }

            OptimizationCommands::Show { job_id, id } => {
                match service.get_cv_optimization(&job_id, &id)? {
                    Some(mut optimization) => {
                        optimization[markdown::TITLE_KEY] = Value::String(format!("Optimization {}", id));
                        print!("{}", markdown::convert_value(&optimization)?);
                    }
                    None => println!("Optimization '{}' for job posting '{}' not found.", id, job_id),
                }
            }

            OptimizationCommands::Save { job_id, id, cv_id } => {
                service.save_cv_optimization(&job_id, &id, &cv_id)?;
                println!("Saved optimization '{}' for job posting '{}'", id, job_id);
            }

            OptimizationCommands::Purge { job_id, id } => {
                if service.purge_cv_optimization(&job_id, &id)? {
                    println!("Purged optimization '{}' of job posting '{}'.", id, job_id);
                } else {
                    println!("Optimization '{}' for job posting '{}' not found.", id, job_id);
                }
            }
        },

        Commands::Browse => tui::run_browse(&service)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }

    #[test]
    fn test_regenerate_markdown_flag() {
        let cli = Cli::try_parse_from(["cvjoint", "--regenerate-markdown"]).unwrap();
        assert_eq!(cli.regenerate_markdown, Some(None));

        let cli = Cli::try_parse_from(["cvjoint", "--regenerate-markdown", "cvs"]).unwrap();
        assert_eq!(cli.regenerate_markdown, Some(Some("cvs".to_string())));

        let cli = Cli::try_parse_from(["cvjoint", "job", "list"]).unwrap();
        assert_eq!(cli.regenerate_markdown, None);
    }

    #[test]
    fn test_clear_markdown_flag() {
        let cli = Cli::try_parse_from(["cvjoint", "--clear-markdown"]).unwrap();
        assert_eq!(cli.clear_markdown, Some(vec![]));

        let cli =
            Cli::try_parse_from(["cvjoint", "--clear-markdown", "job-postings", "acme-swe"]).unwrap();
        assert_eq!(
            cli.clear_markdown,
            Some(vec!["job-postings".to_string(), "acme-swe".to_string()])
        );
    }

    #[test]
    fn test_save_as_requires_save() {
        assert!(Cli::try_parse_from(["cvjoint", "cv", "analyze", "cv.txt", "--as", "jane"]).is_err());
        assert!(
            Cli::try_parse_from(["cvjoint", "cv", "analyze", "cv.txt", "--save", "--as", "jane"]).is_ok()
        );
    }

    #[test]
    fn test_optimization_subcommands_parse() {
        let cli = Cli::try_parse_from(["cvjoint", "optimization", "save", "acme-swe", "opt-1", "jane"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Optimization {
                command: OptimizationCommands::Save { .. }
            })
        ));
    }

    #[test]
    fn test_build_service_with_data_dir_override() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = ConfigLoader::with_layers(include_str!("../config/settings.yaml"), None, None)
            .load_settings()
            .unwrap();
        let service = build_service(&settings, dir.path().to_str()).unwrap();
        assert!(service.get_job_postings().unwrap().is_empty());
        assert!(dir.path().join("collections").is_dir());
    }
}
