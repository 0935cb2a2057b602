//! Linear pipeline run: subs file → latex source → toolchain → final names.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::annotation::{self, AnnotationDocument};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::image::ImageAsset;
use crate::store::{subs_file_name, subs_path_for};

use super::latex::{latex_errors, source_document, stderr_tail};
use super::runner::{ProcessRunner, ToolInvocation, ToolRunner};
use super::{OutputFormat, OutputFormats, PipelineReport, Stage, JOB_SUFFIX, OUTPUT_SUFFIX};

/// Intermediate files removed after a run, by suffix appended to the job name.
const INTERMEDIATES: [&str; 7] = [".tex", ".aux", ".log", ".dvi", ".ps", ".pdf", "-crop.ps"];

/// File names of one run, all relative to the image directory.
#[derive(Debug, Clone)]
struct JobFiles {
    dir: PathBuf,
    job: String,
    stem: String,
}

impl JobFiles {
    fn new(image: &ImageAsset) -> Self {
        let stem = image.stem();
        Self {
            dir: image.dir(),
            job: format!("{stem}{JOB_SUFFIX}"),
            stem,
        }
    }

    /// Job file name `<job><suffix>`, e.g. `fig-psfrag.dvi`.
    fn job(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.job)
    }

    /// Final output name `<stem>-latex.<ext>`.
    fn output(&self, format: OutputFormat) -> String {
        format!("{}{OUTPUT_SUFFIX}.{}", self.stem, format.extension())
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

/// Drives the external toolchain for one document snapshot.
pub struct Invoker<R = ProcessRunner> {
    ctx: Context,
    runner: Arc<R>,
    formats: OutputFormats,
    keep_intermediates: bool,
}

impl<R> Clone for Invoker<R> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            runner: Arc::clone(&self.runner),
            formats: self.formats,
            keep_intermediates: self.keep_intermediates,
        }
    }
}

impl Invoker<ProcessRunner> {
    /// Invoker running real subprocesses, with formats taken from the config.
    #[must_use]
    pub fn new(ctx: Context) -> Self {
        Self::with_runner(ctx, ProcessRunner)
    }
}

impl<R: ToolRunner + 'static> Invoker<R> {
    #[must_use]
    pub fn with_runner(ctx: Context, runner: R) -> Self {
        let formats = OutputFormats::from(&ctx.config.output);
        let keep_intermediates = ctx.config.output.keep_intermediates;
        Self {
            ctx,
            runner: Arc::new(runner),
            formats,
            keep_intermediates,
        }
    }

    #[must_use]
    pub fn with_formats(mut self, formats: OutputFormats) -> Self {
        self.formats = formats;
        self
    }

    pub fn formats(&self) -> &OutputFormats {
        &self.formats
    }

    /// External steps for `image`, in execution order.
    pub fn plan(&self, image: &ImageAsset) -> Vec<ToolInvocation> {
        let files = JobFiles::new(image);
        let tools = &self.ctx.config.tools;
        let step = |step: &'static str, program: &str, args: Vec<String>, outputs: &[String]| {
            ToolInvocation {
                step,
                program: program.to_string(),
                args,
                cwd: files.dir.clone(),
                outputs: outputs.iter().map(|o| files.path(o)).collect(),
            }
        };

        let tex = files.job(".tex");
        let dvi = files.job(".dvi");
        let ps = files.job(".ps");
        let pdf = files.job(".pdf");
        let crop_pdf = files.job("-crop.pdf");
        let crop_ps = files.job("-crop.ps");
        let crop_eps = files.job("-crop.eps");

        let mut steps = vec![
            step(
                "latex",
                &tools.latex,
                vec![
                    "-interaction=nonstopmode".into(),
                    "-halt-on-error".into(),
                    "-file-line-error".into(),
                    tex,
                ],
                &[dvi.clone()],
            ),
            step(
                "dvips",
                &tools.dvips,
                vec!["-q".into(), "-o".into(), ps.clone(), dvi],
                &[ps.clone()],
            ),
            step("ps2pdf", &tools.ps2pdf, vec![ps, pdf.clone()], &[pdf.clone()]),
            step(
                "pdfcrop",
                &tools.pdfcrop,
                vec!["--noverbose".into(), pdf, crop_pdf.clone()],
                &[crop_pdf.clone()],
            ),
            step(
                "pdftops",
                &tools.pdftops,
                vec!["-q".into(), crop_pdf.clone(), crop_ps.clone()],
                &[crop_ps.clone()],
            ),
            step(
                "ps2eps",
                &tools.ps2eps,
                vec!["-q".into(), "-f".into(), crop_ps],
                &[crop_eps],
            ),
        ];

        if self.formats.svg {
            let svg = files.output(OutputFormat::Svg);
            steps.push(step(
                "pdf2svg",
                &tools.pdf2svg,
                vec![crop_pdf.clone(), svg.clone()],
                &[svg],
            ));
        }
        if self.formats.png {
            let png = files.output(OutputFormat::Png);
            steps.push(step(
                "convert",
                &tools.convert,
                vec![
                    "-density".into(),
                    self.formats.density.to_string(),
                    crop_pdf,
                    png.clone(),
                ],
                &[png],
            ));
        }
        steps
    }

    /// Run the whole pipeline on `doc`, which should be a snapshot.
    pub async fn run(&self, doc: &AnnotationDocument, image: &ImageAsset) -> Result<PipelineReport> {
        let (tx, _rx) = watch::channel(Stage::Pending);
        self.execute(doc, image, &tx).await
    }

    /// Start a run in the background. The document and image are moved in,
    /// so later edits by the caller cannot affect it.
    pub fn spawn(&self, doc: AnnotationDocument, image: ImageAsset) -> PipelineHandle {
        let (tx, rx) = watch::channel(Stage::Pending);
        let this = self.clone();
        let task = tokio::spawn(async move { this.execute(&doc, &image, &tx).await });
        PipelineHandle { stage: rx, task }
    }

    async fn execute(
        &self,
        doc: &AnnotationDocument,
        image: &ImageAsset,
        progress: &watch::Sender<Stage>,
    ) -> Result<PipelineReport> {
        let result = self.execute_stages(doc, image, progress).await;
        match &result {
            Ok(report) => {
                progress.send_replace(Stage::Done);
                info!("Replacement done: {} output file(s)", report.outputs.len());
            }
            Err(e) => {
                progress.send_replace(Stage::Failed);
                self.ctx.debug("pipeline", format!("run aborted: {e}"));
            }
        }
        result
    }

    async fn execute_stages(
        &self,
        doc: &AnnotationDocument,
        image: &ImageAsset,
        progress: &watch::Sender<Stage>,
    ) -> Result<PipelineReport> {
        let files = JobFiles::new(image);

        doc.validate()?;
        progress.send_replace(Stage::WritingSubs);
        let subs_file = subs_path_for(image);
        self.ctx
            .debug("pipeline", format!("writing substitution file {}", subs_file.display()));
        fs::write(&subs_file, annotation::serialize(doc)).await?;

        progress.send_replace(Stage::WritingSource);
        self.remove_intermediates(&files, true).await?;
        self.remove_stale_extras(&files).await?;
        let tex = files.path(&files.job(".tex"));
        self.ctx
            .debug("pipeline", format!("writing latex file {}", tex.display()));
        fs::write(&tex, source_document(&subs_file_name(image), &image.file_name())).await?;

        let mut steps = Vec::new();
        for invocation in self.plan(image) {
            progress.send_replace(Stage::Running(invocation.step));
            self.run_step(&invocation).await?;
            steps.push(invocation.step);
        }

        progress.send_replace(Stage::Finalizing);
        let outputs = self.finalize(&files).await?;

        Ok(PipelineReport {
            subs_file,
            outputs,
            steps,
        })
    }

    async fn run_step(&self, invocation: &ToolInvocation) -> Result<()> {
        self.ctx.debug("pipeline", format!("running {}", invocation.step));
        let output = self.runner.run(invocation).await?;

        if !output.success() {
            let mut detail = String::new();
            if invocation.step == "latex" {
                detail = latex_errors(&output.stdout).join("\n");
            }
            if detail.is_empty() {
                detail = stderr_tail(&output.stderr);
            }
            return Err(Error::ToolFailed {
                step: invocation.step,
                program: invocation.program.clone(),
                code: output.code,
                detail,
            });
        }

        for path in &invocation.outputs {
            if !fs::try_exists(path).await.unwrap_or(false) {
                return Err(Error::MissingArtifact {
                    step: invocation.step,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Move cropped artifacts to their final names and clean up.
    async fn finalize(&self, files: &JobFiles) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();

        let eps = files.path(&files.output(OutputFormat::Eps));
        fs::rename(files.path(&files.job("-crop.eps")), &eps).await?;
        outputs.push(eps);

        let crop_pdf = files.path(&files.job("-crop.pdf"));
        if self.formats.pdf {
            let pdf = files.path(&files.output(OutputFormat::Pdf));
            fs::rename(&crop_pdf, &pdf).await?;
            outputs.push(pdf);
        } else {
            remove_if_exists(&crop_pdf).await?;
        }

        if self.formats.svg {
            outputs.push(files.path(&files.output(OutputFormat::Svg)));
        }
        if self.formats.png {
            outputs.push(files.path(&files.output(OutputFormat::Png)));
        }

        if self.keep_intermediates {
            debug!("keeping intermediate files for {}", files.job);
        } else {
            self.remove_intermediates(files, false).await?;
        }
        Ok(outputs)
    }

    /// Delete job intermediates; `stale` also clears cropped leftovers of an
    /// earlier run so the artifact checks cannot see old files.
    async fn remove_intermediates(&self, files: &JobFiles, stale: bool) -> Result<()> {
        for suffix in INTERMEDIATES {
            remove_if_exists(&files.path(&files.job(suffix))).await?;
        }
        if stale {
            for suffix in ["-crop.pdf", "-crop.eps"] {
                remove_if_exists(&files.path(&files.job(suffix))).await?;
            }
        }
        Ok(())
    }

    /// Delete earlier SVG/PNG outputs for the formats about to be produced, so
    /// a step that writes nothing is caught by the artifact check.
    async fn remove_stale_extras(&self, files: &JobFiles) -> Result<()> {
        let extras = [
            (self.formats.svg, OutputFormat::Svg),
            (self.formats.png, OutputFormat::Png),
        ];
        for (_, format) in extras.into_iter().filter(|(requested, _)| *requested) {
            remove_if_exists(&files.path(&files.output(format))).await?;
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

/// A background run started with [`Invoker::spawn`].
pub struct PipelineHandle {
    stage: watch::Receiver<Stage>,
    task: JoinHandle<Result<PipelineReport>>,
}

impl PipelineHandle {
    /// Current stage of the run.
    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> Result<PipelineReport> {
        self.task.await.map_err(|e| Error::Join(e.to_string()))?
    }

    /// Wait for completion, calling `on_tick` with the current stage every
    /// `period` until then.
    pub async fn wait_with_heartbeat<F>(mut self, period: Duration, mut on_tick: F) -> Result<PipelineReport>
    where
        F: FnMut(Stage),
    {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                joined = &mut self.task => {
                    return joined.map_err(|e| Error::Join(e.to_string()))?;
                }
                _ = ticker.tick() => on_tick(*self.stage.borrow()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::LabelRecord;
    use crate::pipeline::ToolOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Creates each step's outputs, optionally failing or skipping one step.
    #[derive(Default)]
    struct FakeToolchain {
        calls: Mutex<Vec<ToolInvocation>>,
        fail_at: Option<&'static str>,
        silent_at: Option<&'static str>,
    }

    impl FakeToolchain {
        fn steps(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().iter().map(|c| c.step).collect()
        }
    }

    #[async_trait]
    impl ToolRunner for FakeToolchain {
        async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            if self.fail_at == Some(invocation.step) {
                return Ok(ToolOutput {
                    code: Some(1),
                    stdout: "./subs-fig.tex:2: Undefined control sequence.\n".to_string(),
                    stderr: "boom\n".to_string(),
                });
            }
            if self.silent_at != Some(invocation.step) {
                for path in &invocation.outputs {
                    std::fs::write(path, invocation.step).unwrap();
                }
            }
            Ok(ToolOutput {
                code: Some(0),
                ..ToolOutput::default()
            })
        }
    }

    fn setup() -> (tempfile::TempDir, ImageAsset, AnnotationDocument) {
        let dir = tempfile::tempdir().unwrap();
        let eps = dir.path().join("fig.eps");
        std::fs::write(&eps, "%!PS\n(x1) show\n").unwrap();
        let image = ImageAsset::load(&eps, &Context::default()).unwrap();
        let mut doc = AnnotationDocument::default();
        doc.push(LabelRecord::new("x1", "$\\alpha$"));
        (dir, image, doc)
    }

    fn invoker(fake: FakeToolchain, formats: OutputFormats) -> Invoker<FakeToolchain> {
        Invoker::with_runner(Context::default(), fake).with_formats(formats)
    }

    #[test]
    fn plan_uses_job_names_and_discrete_args() {
        let image = ImageAsset::from_text("figs/fig.eps", String::new());
        let plan = invoker(FakeToolchain::default(), OutputFormats::default()).plan(&image);

        let names: Vec<_> = plan.iter().map(|s| s.step).collect();
        assert_eq!(names, ["latex", "dvips", "ps2pdf", "pdfcrop", "pdftops", "ps2eps"]);
        assert_eq!(plan[0].args.last().unwrap(), "fig-psfrag.tex");
        assert_eq!(plan[0].outputs, vec![PathBuf::from("figs/fig-psfrag.dvi")]);
        assert_eq!(plan[3].args, ["--noverbose", "fig-psfrag.pdf", "fig-psfrag-crop.pdf"]);
        assert_eq!(plan[5].outputs, vec![PathBuf::from("figs/fig-psfrag-crop.eps")]);
        assert!(plan.iter().all(|s| s.cwd == Path::new("figs")));
    }

    #[test]
    fn plan_adds_requested_extras() {
        let image = ImageAsset::from_text("fig.eps", String::new());
        let formats = OutputFormats {
            svg: true,
            png: true,
            density: 150,
            ..OutputFormats::default()
        };
        let plan = invoker(FakeToolchain::default(), formats).plan(&image);
        let convert = plan.last().unwrap();
        assert_eq!(convert.step, "convert");
        assert_eq!(convert.args, ["-density", "150", "fig-psfrag-crop.pdf", "fig-latex.png"]);
        assert_eq!(plan[plan.len() - 2].step, "pdf2svg");
    }

    #[tokio::test]
    async fn end_to_end_produces_eps_and_png() {
        let (dir, image, doc) = setup();
        let formats = OutputFormats {
            png: true,
            density: 150,
            ..OutputFormats::default()
        };
        let report = invoker(FakeToolchain::default(), formats)
            .run(&doc, &image)
            .await
            .unwrap();

        let eps = dir.path().join("fig-latex.eps");
        let png = dir.path().join("fig-latex.png");
        assert_eq!(report.outputs, vec![eps.clone(), png.clone()]);
        assert!(eps.exists());
        assert!(png.exists());

        let subs = std::fs::read_to_string(dir.path().join("subs-fig.tex")).unwrap();
        assert!(subs.contains("\\psfrag{x1}[bl][bl][1.0][0]{$\\alpha$} %EndPs"));

        for leftover in [
            "fig-psfrag.tex",
            "fig-psfrag.dvi",
            "fig-psfrag.ps",
            "fig-psfrag.pdf",
            "fig-psfrag-crop.pdf",
            "fig-psfrag-crop.ps",
        ] {
            assert!(!dir.path().join(leftover).exists(), "{leftover} left behind");
        }
        assert!(dir.path().join("fig.eps").exists());
    }

    #[tokio::test]
    async fn pdf_output_is_renamed_crop() {
        let (dir, image, doc) = setup();
        let formats = OutputFormats {
            pdf: true,
            ..OutputFormats::default()
        };
        let report = invoker(FakeToolchain::default(), formats)
            .run(&doc, &image)
            .await
            .unwrap();
        let pdf = dir.path().join("fig-latex.pdf");
        assert_eq!(report.outputs[1], pdf);
        assert_eq!(std::fs::read_to_string(pdf).unwrap(), "pdfcrop");
    }

    #[tokio::test]
    async fn failing_step_aborts_pipeline() {
        let (dir, image, doc) = setup();
        let fake = FakeToolchain {
            fail_at: Some("latex"),
            ..FakeToolchain::default()
        };
        let invoker = invoker(fake, OutputFormats::default());
        let err = invoker.run(&doc, &image).await.unwrap_err();

        match err {
            Error::ToolFailed { step, code, detail, .. } => {
                assert_eq!(step, "latex");
                assert_eq!(code, Some(1));
                assert!(detail.contains("Undefined control sequence"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(invoker.runner.steps(), ["latex"]);
        assert!(!dir.path().join("fig-latex.eps").exists());
        assert!(dir.path().join("subs-fig.tex").exists());
    }

    #[tokio::test]
    async fn missing_artifact_is_detected() {
        let (_dir, image, doc) = setup();
        let fake = FakeToolchain {
            silent_at: Some("pdfcrop"),
            ..FakeToolchain::default()
        };
        let invoker = invoker(fake, OutputFormats::default());
        let err = invoker.run(&doc, &image).await.unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { step: "pdfcrop", .. }));
        assert_eq!(invoker.runner.steps(), ["latex", "dvips", "ps2pdf", "pdfcrop"]);
    }

    #[tokio::test]
    async fn keep_intermediates_leaves_job_files() {
        let (dir, image, doc) = setup();
        let mut ctx = Context::default();
        ctx.config.output.keep_intermediates = true;
        Invoker::with_runner(ctx, FakeToolchain::default())
            .run(&doc, &image)
            .await
            .unwrap();
        assert!(dir.path().join("fig-psfrag.tex").exists());
        assert!(dir.path().join("fig-psfrag.dvi").exists());
    }

    #[tokio::test]
    async fn spawned_run_reports_stages() {
        let (_dir, image, doc) = setup();
        let handle = invoker(FakeToolchain::default(), OutputFormats::default()).spawn(doc, image);

        let mut seen = Vec::new();
        let report = handle
            .wait_with_heartbeat(Duration::from_millis(1), |stage| seen.push(stage))
            .await
            .unwrap();
        assert_eq!(report.steps.len(), 6);
        assert!(!seen.is_empty());
    }

    #[tokio::test]
    async fn stale_svg_does_not_hide_a_silent_step() {
        let (dir, image, doc) = setup();
        let svg = dir.path().join("fig-latex.svg");
        std::fs::write(&svg, "OLD RUN").unwrap();

        let fake = FakeToolchain {
            silent_at: Some("pdf2svg"),
            ..FakeToolchain::default()
        };
        let formats = OutputFormats {
            svg: true,
            ..OutputFormats::default()
        };
        let err = invoker(fake, formats).run(&doc, &image).await.unwrap_err();
        assert!(matches!(err, Error::MissingArtifact { step: "pdf2svg", .. }));
        assert!(!svg.exists());
    }

    #[tokio::test]
    async fn unrequested_outputs_are_left_alone() {
        let (dir, image, doc) = setup();
        let png = dir.path().join("fig-latex.png");
        std::fs::write(&png, "earlier").unwrap();

        invoker(FakeToolchain::default(), OutputFormats::default())
            .run(&doc, &image)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(png).unwrap(), "earlier");
    }

    #[tokio::test]
    async fn unwritable_snapshot_is_rejected_before_any_step() {
        let (dir, image, mut doc) = setup();
        doc.push(LabelRecord::new("x_{", "broken"));
        let invoker = invoker(FakeToolchain::default(), OutputFormats::default());

        let err = invoker.run(&doc, &image).await.unwrap_err();
        assert!(matches!(err, Error::InvalidField { .. }));
        assert!(invoker.runner.steps().is_empty());
        assert!(!dir.path().join("subs-fig.tex").exists());
    }
}
