use std::path::PathBuf;

use colored::Colorize;
use listings_core::classifier::{is_candidate_page, page_signals, PageSignals};
use listings_core::types::PageNumber;
use pdf::PdfDocument;
use serde::Serialize;

use crate::prelude::{println, *};
use crate::settings;

#[derive(Debug, clap::Args)]
#[command(name = "classify")]
pub struct App {
    /// Path to the book PDF
    pdf: PathBuf,

    /// Only list pages selected for analysis
    #[arg(long)]
    candidates_only: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
pub struct PageVerdict {
    pub page: PageNumber,
    pub candidate: bool,
    pub signals: PageSignals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn run(app: App, global: crate::Global) -> Result<()> {
    let config = settings::load(global.config.as_deref())?;
    let doc = PdfDocument::open(&app.pdf)
        .wrap_err_with(|| f!("Cannot open {}", app.pdf.display()))?;

    let verdicts: Vec<PageVerdict> = doc
        .page_numbers()
        .into_iter()
        .map(|page| match doc.page_text(page) {
            Ok(text) => PageVerdict {
                page,
                candidate: is_candidate_page(&text, &config.classifier),
                signals: page_signals(&text, &config.classifier),
                error: None,
            },
            Err(e) => PageVerdict {
                page,
                candidate: false,
                signals: PageSignals::default(),
                error: Some(e.to_string()),
            },
        })
        .filter(|verdict| !app.candidates_only || verdict.candidate)
        .collect();

    if app.json {
        println!("{}", serde_json::to_string_pretty(&verdicts)?);
        return Ok(());
    }

    let mut table = new_table();
    table.add_row(prettytable::row![
        "Page", "Numbered", "Keywords", "Marker", "Framework", "Candidate"
    ]);
    for verdict in &verdicts {
        let candidate = match &verdict.error {
            Some(e) => f!("error: {}", e).red().to_string(),
            None if verdict.candidate => "yes".green().to_string(),
            None => "no".dimmed().to_string(),
        };
        table.add_row(prettytable::row![
            verdict.page,
            verdict.signals.numbered_lines,
            mark(verdict.signals.keywords),
            mark(verdict.signals.description_marker),
            mark(verdict.signals.framework_tokens),
            candidate
        ]);
    }
    table.printstd();

    let candidates = verdicts.iter().filter(|v| v.candidate).count();
    println!("\n{} candidate pages of {}", candidates, doc.page_count());
    Ok(())
}

fn mark(signal: bool) -> &'static str {
    if signal {
        "x"
    } else {
        ""
    }
}
