//! Engine argument list
//!
//! The engine takes a flat list of tokens: an operation name followed by
//! `-<code>=<value>` flags. Flags are order-significant and the per-context
//! block repeats once per evaluated context.

use std::fmt;

/// Flags understood by the CQL engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// `-fv`: FHIR version
    FhirVersion,
    /// `-op`: options file URI
    OptionsPath,
    /// `-ln`: library name
    LibraryName,
    /// `-lu`: library directory URI
    LibraryUrl,
    /// `-e`: expression name
    Expression,
    /// `-t`: terminology directory URI
    Terminology,
    /// `-m`: model type
    Model,
    /// `-mu`: model data URI
    ModelUrl,
    /// `-c`: context type
    Context,
    /// `-cv`: context value
    ContextValue,
    /// `-p`: parameter name
    Parameter,
    /// `-pv`: parameter value
    ParameterValue,
}

impl Flag {
    pub const ALL: [Flag; 12] = [
        Flag::FhirVersion,
        Flag::OptionsPath,
        Flag::LibraryName,
        Flag::LibraryUrl,
        Flag::Expression,
        Flag::Terminology,
        Flag::Model,
        Flag::ModelUrl,
        Flag::Context,
        Flag::ContextValue,
        Flag::Parameter,
        Flag::ParameterValue,
    ];

    pub const fn code(&self) -> &'static str {
        match self {
            Flag::FhirVersion => "fv",
            Flag::OptionsPath => "op",
            Flag::LibraryName => "ln",
            Flag::LibraryUrl => "lu",
            Flag::Expression => "e",
            Flag::Terminology => "t",
            Flag::Model => "m",
            Flag::ModelUrl => "mu",
            Flag::Context => "c",
            Flag::ContextValue => "cv",
            Flag::Parameter => "p",
            Flag::ParameterValue => "pv",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|flag| flag.code() == code)
    }

    /// Render one token: `-<code>=<value>`
    pub fn token(&self, value: impl fmt::Display) -> String {
        format!("-{}={}", self.code(), value)
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}=", self.code())
    }
}

/// A classified token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<'a> {
    /// Leading operation name, e.g. `cql`
    Operation(&'a str),
    Flag(Flag, &'a str),
    /// A dash token with an unknown code
    Unknown(&'a str),
}

impl<'a> Arg<'a> {
    pub fn parse(token: &'a str) -> Self {
        let Some(rest) = token.strip_prefix('-') else {
            return Arg::Operation(token);
        };
        match rest.split_once('=') {
            Some((code, value)) => match Flag::from_code(code) {
                Some(flag) => Arg::Flag(flag, value),
                None => Arg::Unknown(token),
            },
            None => Arg::Unknown(token),
        }
    }
}

/// Ordered list of engine tokens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgList {
    tokens: Vec<String>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a list with an operation marker
    pub fn operation(name: impl Into<String>) -> Self {
        Self {
            tokens: vec![name.into()],
        }
    }

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, flag: Flag, value: impl fmt::Display) -> &mut Self {
        self.tokens.push(flag.token(value));
        self
    }

    pub fn push_if(&mut self, flag: Flag, value: impl fmt::Display, condition: bool) -> &mut Self {
        if condition {
            self.push(flag, value);
        }
        self
    }

    pub fn push_opt<T: fmt::Display>(&mut self, flag: Flag, value: Option<T>) -> &mut Self {
        if let Some(value) = value {
            self.push(flag, value);
        }
        self
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = Arg<'_>> {
        self.tokens.iter().map(|t| Arg::parse(t))
    }

    pub fn operation_name(&self) -> Option<&str> {
        match self.iter().next()? {
            Arg::Operation(name) => Some(name),
            _ => None,
        }
    }

    /// First value of a flag
    pub fn first(&self, flag: Flag) -> Option<&str> {
        self.values(flag).into_iter().next()
    }

    /// All values of a flag, in order
    pub fn values(&self, flag: Flag) -> Vec<&str> {
        self.iter()
            .filter_map(|arg| match arg {
                Arg::Flag(f, value) if f == flag => Some(value),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}
