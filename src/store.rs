//! Annotation store: the loaded image together with its substitution records.

use std::path::{Path, PathBuf};

use crate::annotation::{self, validate_tag, AnnotationDocument, LabelRecord, RecordId};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::image::{has_extension, ImageAsset};

/// How load problems are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Batch run: every problem aborts.
    #[default]
    Headless,
    /// Editing session: recoverable problems degrade to warnings.
    Interactive,
}

/// Path of the substitution file: `<image dir>/subs-<image stem>.tex`.
pub fn subs_path_for(image: &ImageAsset) -> PathBuf {
    image.dir().join(subs_file_name(image))
}

pub fn subs_file_name(image: &ImageAsset) -> String {
    format!("subs-{}.tex", image.stem())
}

/// Image plus the substitution document being edited.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    image: ImageAsset,
    document: AnnotationDocument,
    source: Option<PathBuf>,
}

impl AnnotationStore {
    /// Load the image and, if available, its substitution file.
    ///
    /// Without `subs`, a `subs-<stem>.tex` next to the image is picked up
    /// when present.
    pub fn open(ctx: &Context, image: &Path, subs: Option<&Path>, mode: Mode) -> Result<Self> {
        let image = ImageAsset::load(image, ctx)?;

        let source = match subs {
            Some(path) => Self::check_subs_path(ctx, path, mode)?,
            None => {
                let derived = subs_path_for(&image);
                derived.is_file().then_some(derived)
            }
        };

        let document = match &source {
            Some(path) => {
                ctx.debug("store", format!("loading labels from {}", path.display()));
                let text = std::fs::read_to_string(path)?;
                annotation::parse(&text, ctx)?
            }
            None => AnnotationDocument::default(),
        };

        Ok(Self {
            image,
            document,
            source,
        })
    }

    /// Build directly from parts.
    pub fn from_parts(image: ImageAsset, document: AnnotationDocument) -> Self {
        Self {
            image,
            document,
            source: None,
        }
    }

    fn check_subs_path(ctx: &Context, path: &Path, mode: Mode) -> Result<Option<PathBuf>> {
        if !path.is_file() {
            ctx.error("store", format!("File {} does not exist", path.display()));
            return Ok(None);
        }
        if has_extension(path, "tex") {
            return Ok(Some(path.to_path_buf()));
        }

        let err = Error::WrongExtension {
            path: path.to_path_buf(),
            expected: "tex",
        };
        match mode {
            Mode::Headless => Err(err),
            Mode::Interactive => {
                ctx.warn("store", format!("{err}; substitution file ignored"));
                Ok(None)
            }
        }
    }

    pub fn image(&self) -> &ImageAsset {
        &self.image
    }

    pub fn document(&self) -> &AnnotationDocument {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut AnnotationDocument {
        &mut self.document
    }

    /// Substitution file the records were read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Consistent copy of the records for a pipeline run.
    pub fn snapshot(&self) -> AnnotationDocument {
        self.document.clone()
    }

    /// Where `create_subs` writes.
    pub fn subs_path(&self) -> PathBuf {
        subs_path_for(&self.image)
    }

    /// Whether the tag of record `id` is drawn in the image.
    pub fn check_tag(&self, id: RecordId) -> Result<bool> {
        let record = self.document.get(id).ok_or(Error::UnknownRecord(id))?;
        Ok(self.image.check_tag(&record.tag))
    }

    /// Append one empty record per heuristic candidate tag, but only when the
    /// document has no records yet. Returns the number appended.
    ///
    /// Candidates that could not be written back as a tag (unbalanced braces)
    /// are skipped.
    pub fn prepopulate_candidates(&mut self) -> usize {
        if !self.document.is_empty() {
            return 0;
        }
        for tag in self.image.candidates() {
            if validate_tag(tag).is_ok() {
                self.document.push(LabelRecord::new(tag.clone(), ""));
            }
        }
        self.document.len()
    }

    /// Serialize the records to [`Self::subs_path`], overwriting any file there.
    pub fn create_subs(&self, ctx: &Context) -> Result<PathBuf> {
        self.document.validate()?;
        let path = self.subs_path();
        ctx.debug("store", format!("writing substitution file {}", path.display()));
        std::fs::write(&path, annotation::serialize(&self.document))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const EPS: &str = "%!PS-Adobe-3.0 EPSF-3.0\n%%Creator: gnuplot 5.4\n(x1) Cshow\n(y1) Lshow\n";

    fn write_eps(dir: &Path) -> PathBuf {
        let path = dir.join("fig.eps");
        fs::write(&path, EPS).unwrap();
        path
    }

    #[test]
    fn open_without_subs_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let eps = write_eps(dir.path());
        let store = AnnotationStore::open(&Context::default(), &eps, None, Mode::Headless).unwrap();
        assert!(store.document().is_empty());
        assert!(store.source().is_none());
        assert_eq!(store.subs_path(), dir.path().join("subs-fig.tex"));
    }

    #[test]
    fn open_picks_up_derived_subs_file() {
        let dir = tempfile::tempdir().unwrap();
        let eps = write_eps(dir.path());
        fs::write(
            dir.path().join("subs-fig.tex"),
            "% BEGIN INFO\n% END INFO\n% BEGIN PS\n\\psfrag{x1}[][]{$x$} %EndPs\n% END PS\n",
        )
        .unwrap();

        let store = AnnotationStore::open(&Context::default(), &eps, None, Mode::Headless).unwrap();
        assert_eq!(store.document().len(), 1);
        let id = store.document().ids()[0];
        assert!(store.check_tag(id).unwrap());
    }

    #[test]
    fn missing_subs_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let eps = write_eps(dir.path());
        let store = AnnotationStore::open(
            &Context::default(),
            &eps,
            Some(&dir.path().join("nope.tex")),
            Mode::Headless,
        )
        .unwrap();
        assert!(store.document().is_empty());
    }

    #[test]
    fn wrong_subs_extension_depends_on_mode() {
        let dir = tempfile::tempdir().unwrap();
        let eps = write_eps(dir.path());
        let txt = dir.path().join("subs.txt");
        fs::write(&txt, "").unwrap();

        let headless = AnnotationStore::open(&Context::default(), &eps, Some(&txt), Mode::Headless);
        assert!(matches!(headless, Err(Error::WrongExtension { expected: "tex", .. })));

        let interactive =
            AnnotationStore::open(&Context::default(), &eps, Some(&txt), Mode::Interactive).unwrap();
        assert!(interactive.source().is_none());
    }

    #[test]
    fn missing_image_is_fatal() {
        let err = AnnotationStore::open(
            &Context::default(),
            Path::new("/nonexistent/fig.eps"),
            None,
            Mode::Interactive,
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }

    #[test]
    fn create_subs_overwrites_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let eps = write_eps(dir.path());
        let ctx = Context::default();
        let mut store = AnnotationStore::open(&ctx, &eps, None, Mode::Headless).unwrap();
        fs::write(store.subs_path(), "stale").unwrap();

        store.document_mut().push(LabelRecord::new("x1", "$\\alpha$"));
        let written = store.create_subs(&ctx).unwrap();

        let reloaded = annotation::parse(&fs::read_to_string(written).unwrap(), &ctx).unwrap();
        assert_eq!(&reloaded, store.document());
    }

    #[test]
    fn candidates_prepopulate_only_empty_documents() {
        let image = ImageAsset::from_text("fig.eps", EPS.to_string());
        let mut store = AnnotationStore::from_parts(image.clone(), AnnotationDocument::default());
        assert_eq!(store.prepopulate_candidates(), 2);
        assert_eq!(store.document().records().next().unwrap().tag, "x1");

        let mut doc = AnnotationDocument::default();
        doc.push(LabelRecord::new("z", "Z"));
        let mut store = AnnotationStore::from_parts(image, doc);
        assert_eq!(store.prepopulate_candidates(), 0);
        assert_eq!(store.document().len(), 1);
    }

    #[test]
    fn braced_candidates_survive_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let eps = dir.path().join("fig.eps");
        fs::write(
            &eps,
            "%!PS-Adobe-3.0 EPSF-3.0\n%%Creator: gnuplot 5.4\n(x_{1}) Cshow\n(y_{2) Lshow\n",
        )
        .unwrap();
        let ctx = Context::default();

        let mut store = AnnotationStore::open(&ctx, &eps, None, Mode::Interactive).unwrap();
        assert_eq!(store.prepopulate_candidates(), 1);
        let id = store.document().ids()[0];
        store.document_mut().set_replacement(id, "$x_1$").unwrap();
        store.create_subs(&ctx).unwrap();

        let reopened = AnnotationStore::open(&ctx, &eps, None, Mode::Interactive).unwrap();
        assert_eq!(reopened.document(), store.document());
        assert_eq!(reopened.document().records().next().unwrap().tag, "x_{1}");
    }

    #[test]
    fn create_subs_refuses_unwritable_records() {
        let dir = tempfile::tempdir().unwrap();
        let eps = write_eps(dir.path());
        let ctx = Context::default();
        let mut store = AnnotationStore::open(&ctx, &eps, None, Mode::Headless).unwrap();
        store.document_mut().push(LabelRecord::new("x_{", "broken"));

        assert!(matches!(store.create_subs(&ctx), Err(Error::InvalidField { .. })));
        assert!(!store.subs_path().exists());
    }
}
