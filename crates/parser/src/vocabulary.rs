//! Action signatures recognized by the parser

/// Declared shape of one action: its name and argument names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSignature {
    name: String,
    required: Vec<String>,
    optional: Vec<String>,
    open_tag: String,
    close_tag: String,
}

impl ActionSignature {
    pub fn new<I, J, S, T>(name: impl Into<String>, required: I, optional: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        let name = name.into();
        Self {
            open_tag: format!("<{}>", name),
            close_tag: format!("</{}>", name),
            required: required.into_iter().map(Into::into).collect(),
            optional: optional.into_iter().map(Into::into).collect(),
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn optional(&self) -> &[String] {
        &self.optional
    }

    /// Required then optional argument names
    pub fn arguments(&self) -> impl Iterator<Item = &str> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .map(String::as_str)
    }

    pub fn declares(&self, argument: &str) -> bool {
        self.arguments().any(|a| a == argument)
    }

    /// `<name>`
    pub fn open_tag(&self) -> &str {
        &self.open_tag
    }

    /// `</name>`
    pub fn close_tag(&self) -> &str {
        &self.close_tag
    }
}

/// Ordered set of action signatures.
///
/// Order matters: when two opening delimiters match the same suffix the
/// earlier entry wins.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    signatures: Vec<ActionSignature>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a signature, replacing an existing one with the same name in place
    pub fn insert(&mut self, signature: ActionSignature) {
        match self
            .signatures
            .iter_mut()
            .find(|s| s.name == signature.name)
        {
            Some(existing) => *existing = signature,
            None => self.signatures.push(signature),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ActionSignature> {
        self.signatures.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionSignature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

impl FromIterator<ActionSignature> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = ActionSignature>>(iter: I) -> Self {
        let mut vocabulary = Vocabulary::new();
        for signature in iter {
            vocabulary.insert(signature);
        }
        vocabulary
    }
}
