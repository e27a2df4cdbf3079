use core::error::Error;
use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FormatResult;
use std::io::Error as IOError;
use std::path::PathBuf;

pub(crate) use gdal::errors::GdalError;
pub(crate) use clap::error::Error as ArgumentError;

#[derive(Debug)]
pub enum CommandError {
    GdalError(GdalError),
    IOError(IOError),
    JSONError(String),
    MissingField(&'static str),
    MissingFeature(String,u64),
    InvalidPattern(String),
    NoTemplatesFound(PathBuf),
    MalformedCrsSelection(String),
    UnknownCrs(String),
    NoTemplateLayersCreated,
    NoVectorLayers(PathBuf),
    LayerRequired(Vec<String>),
    LayerNotFound(String),
    MissingDesignationField(String),
    MissingLocalIdField(String),
}

impl Error for CommandError {

}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::GdalError(a) => write!(f,"gdal: {a}"),
            Self::IOError(a) => write!(f,"io: {a}"),
            Self::JSONError(a) => write!(f,"json: {a}"),
            Self::MissingField(a) => write!(f,"While loading data, a record had no value in for '{a}'"),
            Self::MissingFeature(layer, id) => write!(f,"While loading data, layer '{layer}' had no feature id '{id}'"),
            Self::InvalidPattern(a) => write!(f,"pattern: {a}"),
            Self::NoTemplatesFound(a) => write!(f,"No template datasets were found in '{}'. Make sure the directory contains the template layer files.",a.display()),
            Self::MalformedCrsSelection(a) => write!(f,"Could not identify a coordinate reference system in the selection '{a}'."),
            Self::UnknownCrs(a) => write!(f,"'{a}' is not one of the available coordinate reference systems (EPSG:2176, EPSG:2177, EPSG:2178, EPSG:2179)."),
            Self::NoTemplateLayersCreated => write!(f,"None of the template layers could be created. Check that the template datasets are valid."),
            Self::NoVectorLayers(a) => write!(f,"'{}' does not contain any vector layers. Choose a vector dataset and try again.",a.display()),
            Self::LayerRequired(a) => write!(f,"The dataset contains more than one layer, choose one with --layer: {}",a.join(", ")),
            Self::LayerNotFound(a) => write!(f,"The dataset does not contain a layer named '{a}'."),
            Self::MissingDesignationField(a) => write!(f,"Layer '{a}' does not contain the field 'oznaczenie'. Choose the correct layer and try again."),
            Self::MissingLocalIdField(a) => write!(f,"Layer '{a}' does not contain the required field 'lokalnyId'. Make sure the layer has a 'lokalnyId' field and try again."),
        }
    }
}

impl From<GdalError> for CommandError {

    fn from(value: GdalError) -> Self {
        Self::GdalError(value)
    }
}

impl From<IOError> for CommandError {

    fn from(value: IOError) -> Self {
        Self::IOError(value)
    }
}

impl From<regex::Error> for CommandError {

    fn from(value: regex::Error) -> Self {
        Self::InvalidPattern(format!("{value}"))
    }
}

impl From<serde_json::Error> for CommandError {

    fn from(value: serde_json::Error) -> Self {
        Self::JSONError(format!("{value}"))
    }
}

#[derive(Debug)]
pub enum ProgramError {
    ArgumentError(ArgumentError),
    CommandError(CommandError)
}

impl Error for ProgramError {

}

impl Display for ProgramError {

    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            Self::ArgumentError(a) => write!(f,"{a}"),
            Self::CommandError(a) => write!(f,"{a}"),
        }
    }
}

impl From<ArgumentError> for ProgramError {

    fn from(value: ArgumentError) -> Self {
        Self::ArgumentError(value)
    }
}

impl From<CommandError> for ProgramError {

    fn from(value: CommandError) -> Self {
        Self::CommandError(value)
    }
}
