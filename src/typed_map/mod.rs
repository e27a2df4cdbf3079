/*!
Typed access to the attribute-only tables this program keeps inside a project file. A table is declared once with the `layer!` macro, which generates its schema, a feature wrapper with typed getters and setters, and a layer type.
*/

pub(crate) mod fields;
pub(crate) mod features;
pub(crate) mod layers;
