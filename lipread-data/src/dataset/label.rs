use crate::{common::*, error::DatasetError};

/// Extract the label token of a clip file.
///
/// The token is the part of the file name before the first underscore, e.g.
/// `ABOUT` for `/data/ABOUT/train/ABOUT_00001.mpg`. A file name without
/// underscore is taken as a whole.
pub fn label_from_path(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| format_err!("invalid clip file name '{}'", path.display()))?;
    let label = file_name.split('_').next().unwrap_or(file_name);
    ensure!(
        !label.is_empty(),
        "clip file name '{}' has an empty label",
        path.display()
    );
    Ok(label.to_owned())
}

/// Extract the label token of every clip file.
pub fn labels_from_paths<P>(paths: &[P]) -> Result<Vec<String>>
where
    P: AsRef<Path>,
{
    paths.iter().map(label_from_path).try_collect()
}

/// The mapping from label strings to dense class ids.
///
/// Ids are assigned by the lexicographic rank of distinct labels, so the
/// mapping only depends on the set of labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelIndex {
    classes: IndexSet<String>,
}

impl LabelIndex {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: IndexSet<String> = labels
            .into_iter()
            .map(Into::into)
            .sorted()
            .dedup()
            .collect();
        Self { classes }
    }

    /// The number of distinct labels.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &IndexSet<String> {
        &self.classes
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.classes.get_index_of(label)
    }

    /// Get the class id of a label, failing on unknown labels.
    pub fn f_id(&self, label: &str) -> Result<usize> {
        let id = self.id(label).ok_or_else(|| DatasetError::UnknownLabel {
            label: label.to_owned(),
        })?;
        Ok(id)
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.classes.get_index(id).map(String::as_str)
    }

    /// Iterate over `(id, label)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.classes
            .iter()
            .enumerate()
            .map(|(id, label)| (id, label.as_str()))
    }
}
