//! CLI `search` command: keyword search over the index, or TF-IDF similarity.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;

use lore::index::{DecisionFilter, FileFilter, SearchIndex, WarningFilter};
use lore::semantic::DocType;

use super::{preview, Workspace};

const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SearchKind {
    Decisions,
    Warnings,
    Files,
    Chunks,
    /// Every document type (semantic search only)
    All,
}

impl SearchKind {
    fn doc_type(self) -> Result<Option<DocType>> {
        match self {
            Self::Decisions => Ok(Some(DocType::Decision)),
            Self::Warnings => Ok(Some(DocType::Warning)),
            Self::Files => Ok(Some(DocType::File)),
            Self::All => Ok(None),
            Self::Chunks => Err(anyhow!("code chunks have no semantic vectors; drop --semantic")),
        }
    }
}

pub struct SearchArgs {
    pub query: String,
    pub kind: SearchKind,
    pub semantic: bool,
    pub feature: Option<String>,
    pub language: Option<String>,
    pub limit: Option<usize>,
}

/// Run a search from the terminal.
pub fn search(workspace: &Workspace, args: &SearchArgs) -> Result<()> {
    let index = workspace.open_index()?;
    if args.semantic {
        return semantic_search(workspace, &index, args);
    }

    let limits = &workspace.config.search;
    let lines: Vec<String> = match args.kind {
        SearchKind::Decisions => {
            let filter = DecisionFilter {
                feature: args.feature.clone(),
                ..Default::default()
            };
            index
                .search_decisions(&args.query, &filter, Some(args.limit.unwrap_or(limits.knowledge_limit)))
                .context("decision search failed")?
                .into_iter()
                .map(|d| {
                    format!(
                        "[{}] {} ({})\n     {}",
                        d.status,
                        d.id,
                        d.feature.as_deref().unwrap_or("-"),
                        preview(&d.content, PREVIEW_CHARS)
                    )
                })
                .collect()
        }
        SearchKind::Warnings => {
            let filter = WarningFilter {
                feature: args.feature.clone(),
                ..Default::default()
            };
            index
                .search_warnings(&args.query, &filter, Some(args.limit.unwrap_or(limits.knowledge_limit)))
                .context("warning search failed")?
                .into_iter()
                .map(|w| {
                    format!(
                        "[{}] {} ({})\n     {}",
                        w.severity,
                        w.id,
                        w.feature.as_deref().unwrap_or("-"),
                        preview(&w.content, PREVIEW_CHARS)
                    )
                })
                .collect()
        }
        SearchKind::Files => {
            let filter = FileFilter {
                language: args.language.clone(),
            };
            index
                .search_files(&args.query, &filter, Some(args.limit.unwrap_or(limits.file_limit)))
                .context("file search failed")?
                .into_iter()
                .map(|f| format!("{}\n     {}", f.path, preview(&f.summary, PREVIEW_CHARS)))
                .collect()
        }
        SearchKind::Chunks => index
            .search_code_chunks(&args.query, args.language.as_deref(), args.limit)
            .context("code chunk search failed")?
            .into_iter()
            .map(|c| {
                format!(
                    "{}:{}-{} {} {}\n     {}",
                    c.path,
                    c.start_line,
                    c.end_line,
                    c.kind,
                    c.name,
                    preview(&c.content, PREVIEW_CHARS)
                )
            })
            .collect(),
        SearchKind::All => {
            return Err(anyhow!("--kind all requires --semantic"));
        }
    };

    print_results(&lines);
    Ok(())
}

fn semantic_search(workspace: &Workspace, index: &SearchIndex, args: &SearchArgs) -> Result<()> {
    let doc_type = args.kind.doc_type()?;
    let limit = args.limit.unwrap_or(workspace.config.search.knowledge_limit);
    let hits = index
        .semantic(&workspace.config.semantic)
        .search(&args.query, doc_type, limit)
        .context("semantic search failed")?;

    let lines: Vec<String> = hits
        .iter()
        .map(|h| {
            format!(
                "[{}] {} (similarity: {:.3})\n     {}",
                h.doc_type,
                h.id,
                h.similarity,
                preview(&h.content, PREVIEW_CHARS)
            )
        })
        .collect();
    print_results(&lines);
    Ok(())
}

fn print_results(lines: &[String]) {
    if lines.is_empty() {
        println!("No results found.");
        return;
    }
    println!("Found {} result(s)\n", lines.len());
    for (i, line) in lines.iter().enumerate() {
        println!("  {}. {}", i + 1, line);
        println!();
    }
}
