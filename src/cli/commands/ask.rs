use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use super::open_index;
use crate::cli::output::get_formatter;
use crate::error::RetrievalError;
use crate::models::{Config, OutputFormat};
use crate::services::{AnswerSynthesizer, GeminiClient, Retriever};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "Question to answer")]
    pub question: String,

    #[arg(long, short = 'k', help = "Number of chunks to retrieve")]
    pub top_k: Option<usize>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let question = args.question.trim();
    if question.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let (embedder, index) = open_index(&config).await?;
    let retriever = Retriever::new(embedder, index, &config.retrieval);
    let top_k = args.top_k.unwrap_or(retriever.top_k());

    let retrieval = match retriever.retrieve(question, top_k).await {
        Ok(result) => result,
        Err(RetrievalError::IndexUnavailable(msg)) => {
            anyhow::bail!(
                "knowledge base is empty ({}); run `tutor ingest <path>` or `tutor serve` first",
                msg
            );
        }
        Err(e) => return Err(anyhow::Error::new(e).context("retrieval failed")),
    };

    if verbose {
        for hit in &retrieval.hits {
            eprintln!(
                "  [{:.3}] {} #{}",
                hit.score, hit.document_name, hit.chunk_index
            );
        }
    }

    let generator = Arc::new(GeminiClient::new(&config.generation)?);
    let synthesizer = AnswerSynthesizer::new(generator, &config.generation);
    let answer = synthesizer.synthesize(question, &retrieval).await;

    print!("{}", formatter.format_answer(question, &answer, &retrieval));
    Ok(())
}
