use std::fmt::Write as FmtWrite;

use console::style;
use serde::Serialize;

use crate::models::{Answer, OutputFormat, RetrievalResult};

pub trait Formatter {
    fn format_answer(&self, question: &str, answer: &Answer, retrieval: &RetrievalResult)
    -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_ingest_stats(&self, stats: &IngestStats) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub embedding_model: String,
    pub embedding_loaded: bool,
    pub vector_store_driver: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub indexed_chunks: u64,
    pub data_dir: String,
    pub generation_model: String,
    pub generation_key_set: bool,
    pub documents_uploaded: u64,
    pub quizzes_generated: u64,
    pub study_sessions: u64,
    pub conversations: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: u64,
    pub files_indexed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub duration_ms: u64,
}

fn check(ok: bool) -> String {
    if ok {
        style("[OK]").green().to_string()
    } else {
        style("[MISSING]").red().to_string()
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_answer(
        &self,
        question: &str,
        answer: &Answer,
        retrieval: &RetrievalResult,
    ) -> String {
        let mut output = String::new();
        writeln!(output, "{} {}", style("Q:").bold(), question).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "{}", answer.text.trim_end()).unwrap();

        if !answer.sources.is_empty() {
            writeln!(output).unwrap();
            writeln!(output, "{}", style("Sources").bold()).unwrap();
            for source in &answer.sources {
                writeln!(output, "  - {}", source).unwrap();
            }
        }

        if answer.fallback {
            writeln!(output).unwrap();
            writeln!(
                output,
                "{}",
                style("(generation failed; showing the fallback answer)").yellow()
            )
            .unwrap();
        }

        writeln!(
            output,
            "\n{}",
            style(format!(
                "{} chunk(s) retrieved in {}ms",
                retrieval.len(),
                retrieval.duration_ms
            ))
            .dim()
        )
        .unwrap();
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(
            output,
            "Embedding:     {} {}",
            status.embedding_model,
            check(status.embedding_loaded)
        )
        .unwrap();
        writeln!(
            output,
            "Vector Store:  {} {}",
            status.vector_store_driver,
            check(status.vector_store_connected)
        )
        .unwrap();
        writeln!(output, "  Collection:  {}", status.collection).unwrap();
        writeln!(output, "  Chunks:      {}", status.indexed_chunks).unwrap();
        writeln!(
            output,
            "Generation:    {} {}",
            status.generation_model,
            check(status.generation_key_set)
        )
        .unwrap();
        writeln!(output, "Data dir:      {}", status.data_dir).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "Documents:     {}", status.documents_uploaded).unwrap();
        writeln!(output, "Quizzes:       {}", status.quizzes_generated).unwrap();
        writeln!(output, "Sessions:      {}", status.study_sessions).unwrap();
        writeln!(output, "Conversations: {}", status.conversations).unwrap();
        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Files scanned:  {}", stats.files_scanned).unwrap();
        writeln!(output, "Files indexed:  {}", stats.files_indexed).unwrap();
        writeln!(output, "Files skipped:  {}", stats.files_skipped).unwrap();
        if stats.files_failed > 0 {
            writeln!(
                output,
                "Files failed:   {}",
                style(stats.files_failed).red()
            )
            .unwrap();
        } else {
            writeln!(output, "Files failed:   0").unwrap();
        }
        writeln!(output, "Chunks created: {}", stats.chunks_created).unwrap();
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        message.to_string()
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {}", style("Error:").red().bold(), error)
    }
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render(&self, value: &serde_json::Value) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|_| value.to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_answer(
        &self,
        question: &str,
        answer: &Answer,
        retrieval: &RetrievalResult,
    ) -> String {
        let hits: Vec<serde_json::Value> = retrieval
            .hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "document": hit.document_name,
                    "chunk_index": hit.chunk_index,
                    "score": hit.score,
                })
            })
            .collect();

        self.render(&serde_json::json!({
            "question": question,
            "answer": answer.text,
            "sources": answer.sources,
            "fallback": answer.fallback,
            "hits": hits,
            "duration_ms": retrieval.duration_ms,
        }))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        self.render(&serde_json::to_value(status).unwrap_or_default())
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        self.render(&serde_json::to_value(stats).unwrap_or_default())
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(fallback: bool) -> Answer {
        Answer {
            text: "Paris.".to_string(),
            sources: if fallback {
                vec![]
            } else {
                vec!["geography".to_string()]
            },
            fallback,
        }
    }

    #[test]
    fn test_json_answer_shape() {
        let retrieval = RetrievalResult::new("capital?", vec![], 3);
        let out = JsonFormatter::new(false).format_answer("capital?", &answer(false), &retrieval);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["answer"], "Paris.");
        assert_eq!(value["sources"][0], "geography");
        assert_eq!(value["fallback"], false);
        assert_eq!(value["duration_ms"], 3);
    }

    #[test]
    fn test_text_answer_lists_sources() {
        let retrieval = RetrievalResult::new("capital?", vec![], 3);
        let out = TextFormatter.format_answer("capital?", &answer(false), &retrieval);
        assert!(out.contains("Paris."));
        assert!(out.contains("- geography"));

        let out = TextFormatter.format_answer("capital?", &answer(true), &retrieval);
        assert!(!out.contains("Sources"));
    }

    #[test]
    fn test_json_ingest_stats() {
        let stats = IngestStats {
            files_scanned: 3,
            files_indexed: 2,
            files_failed: 1,
            chunks_created: 7,
            ..Default::default()
        };
        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(true).format_ingest_stats(&stats)).unwrap();
        assert_eq!(value["files_indexed"], 2);
        assert_eq!(value["files_failed"], 1);
        assert_eq!(value["chunks_created"], 7);
    }
}
