//! Headless pipeline: runs every step for one keyword and prints the
//! generated text as it streams.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use seoscribe_core::export::{ExportOutcome, ExportWriter};
use seoscribe_core::generation::{AnthropicClient, Generator};
use seoscribe_core::presets::RefineInstruction;
use seoscribe_core::session::{KeywordInputs, Session};
use seoscribe_core::workflow::{StepInput, StepOutcome, WorkflowController, WorkflowError};

use crate::config::ScribeConfig;

const CHUNK_BUFFER: usize = 64;

pub async fn run_headless(
    config: ScribeConfig,
    inputs: KeywordInputs,
    refinements: &[String],
) -> Result<()> {
    let generator: Arc<dyn Generator> = Arc::new(
        AnthropicClient::new(config.anthropic.clone())
            .context("failed to create Anthropic client")?,
    );
    let controller = WorkflowController::new(
        generator,
        config.prompts,
        ExportWriter::new(&config.output_dir),
    );

    let mut stdout = std::io::stdout();
    let outcome = run_pipeline(&controller, inputs, refinements, &mut stdout).await?;

    println!();
    println!("Markdown: {}", outcome.paths.markdown.display());
    println!("JSON:     {}", outcome.paths.json.display());
    Ok(())
}

/// Drive a fresh session from intake to export, writing streamed text to
/// `out`. Each entry of `refinements` is a preset name or a free-text
/// instruction.
pub async fn run_pipeline<W: Write>(
    controller: &WorkflowController,
    inputs: KeywordInputs,
    refinements: &[String],
    out: &mut W,
) -> Result<ExportOutcome> {
    let mut session = Session::new();
    controller
        .advance(&mut session, StepInput::KeywordIntake(inputs), None)
        .await?;

    for (input, heading) in [
        (StepInput::LsiResearch, "LSI keyword research"),
        (StepInput::ContentBrief, "Content brief"),
        (StepInput::DraftArticle, "Article draft"),
    ] {
        writeln!(out, "\n== {heading} ==\n")?;
        let session = &mut session;
        relay(out, |tx| async move { controller.advance(session, input, Some(&tx)).await })
            .await
            .with_context(|| format!("{heading} failed"))?;
    }

    for text in refinements {
        let instruction = RefineInstruction::from_user_text(text);
        writeln!(out, "\n== Refinement: {text} ==\n")?;
        let session = &mut session;
        relay(out, |tx| async move {
            controller.refine(session, instruction, Some(&tx)).await
        })
        .await
        .with_context(|| format!("refinement {text:?} failed"))?;
    }

    Ok(controller.finalize(&mut session)?)
}

/// Run `op` with a fresh chunk channel and copy every chunk to `out` as it
/// arrives. A failed write closes the channel, which cancels the step.
async fn relay<W, F, Fut>(out: &mut W, op: F) -> Result<StepOutcome, WorkflowError>
where
    W: Write,
    F: FnOnce(mpsc::Sender<String>) -> Fut,
    Fut: Future<Output = Result<StepOutcome, WorkflowError>>,
{
    let (tx, mut rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    let printer = async move {
        while let Some(chunk) = rx.recv().await {
            if out.write_all(chunk.as_bytes()).and_then(|()| out.flush()).is_err() {
                break;
            }
        }
    };
    let (result, ()) = tokio::join!(op(tx), printer);
    result
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use seoscribe_core::export::ExportWriter;
    use seoscribe_core::generation::Generator;
    use seoscribe_core::prompt::PromptSettings;
    use seoscribe_core::workflow::WorkflowController;
    use seoscribe_test_utils::{
        ARTICLE_RESPONSE, BRIEF_RESPONSE, LSI_RESPONSE, ScriptedGenerator, refined_article,
        sample_inputs,
    };

    use super::run_pipeline;

    fn controller(generator: &Arc<ScriptedGenerator>, dir: &std::path::Path) -> WorkflowController {
        WorkflowController::new(
            generator.clone() as Arc<dyn Generator>,
            PromptSettings::default(),
            ExportWriter::new(dir),
        )
    }

    #[tokio::test]
    async fn test_pipeline_streams_every_step_and_exports() {
        let refined = refined_article("short");
        let generator = Arc::new(ScriptedGenerator::with_texts([
            LSI_RESPONSE,
            BRIEF_RESPONSE,
            ARTICLE_RESPONSE,
            refined.as_str(),
        ]));
        let tmp = tempfile::TempDir::new().unwrap();
        let controller = controller(&generator, tmp.path());

        let mut out = Vec::new();
        let outcome = run_pipeline(
            &controller,
            sample_inputs(),
            &["shorten".to_string()],
            &mut out,
        )
        .await
        .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("== LSI keyword research =="));
        assert!(printed.contains(LSI_RESPONSE));
        assert!(printed.contains(BRIEF_RESPONSE));
        assert!(printed.contains(ARTICLE_RESPONSE));
        assert!(printed.contains("== Refinement: shorten =="));
        assert!(printed.contains(&refined));

        assert!(outcome.paths.markdown.exists());
        assert_eq!(outcome.record.article_text, refined);
        assert_eq!(outcome.record.refinements.len(), 1);
        assert!(outcome.record.refinements[0].directive.contains("Tighten"));
    }

    #[tokio::test]
    async fn test_pipeline_stops_at_first_failure() {
        let generator = Arc::new(ScriptedGenerator::with_texts([LSI_RESPONSE]));
        let tmp = tempfile::TempDir::new().unwrap();
        let controller = controller(&generator, tmp.path());

        let err = run_pipeline(&controller, sample_inputs(), &[], &mut Vec::new())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("Content brief failed"), "{err:#}");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
