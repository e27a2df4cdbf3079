use crate::errors::CommandError;
use crate::layer;

// Column names and layout are the ones QGIS uses, so it can find the styles when the project is opened.
layer!(
    /// Styles saved with the layers, in the table QGIS loads default styles from.
    LayerStyle["layer_styles"] {
        /// Always empty for GeoPackage layers.
        #[get(allow(dead_code))] #[set(allow(dead_code))] f_table_catalog: String,
        /// Always empty for GeoPackage layers.
        #[get(allow(dead_code))] #[set(allow(dead_code))] f_table_schema: String,
        /// The name of the styled layer.
        #[set(allow(dead_code))] f_table_name: String,
        /// The geometry column of the styled layer.
        #[get(allow(dead_code))] #[set(allow(dead_code))] f_geometry_column: String,
        /// The name shown in the style manager.
        #[get(allow(dead_code))] #[set(allow(dead_code))] style_name["styleName"]: String,
        /// The QGIS style document.
        #[get(allow(dead_code))] #[set(allow(dead_code))] style_qml["styleQML"]: String,
        #[get(allow(dead_code))] #[set(allow(dead_code))] style_sld["styleSLD"]: String,
        /// Whether QGIS applies this style when the layer is loaded. Only one style per layer should be the default.
        use_as_default["useAsDefault"]: bool,
        #[get(allow(dead_code))] #[set(allow(dead_code))] description: String,
        #[get(allow(dead_code))] #[set(allow(dead_code))] owner: String,
        #[get(allow(dead_code))] #[set(allow(dead_code))] ui: Option<String>,
        #[get(allow(dead_code))] #[set(allow(dead_code))] update_time: Option<String>,
    }
);

impl LayerStyleLayer<'_> {

    /// Saves the style as the default for the layer, replacing the previous default.
    pub(crate) fn load_style(&mut self, table_name: &str, geometry_column: &str, style_name: &str, qml: String) -> Result<(),CommandError> {
        let previous = self.read_features().ids_where(|feature| Ok(feature.use_as_default()? && (feature.f_table_name()? == table_name)))?;

        for fid in previous {
            let mut feature = self.try_feature_by_id(fid)?;
            feature.set_use_as_default(&false)?;
            self.update_feature(feature)?;
        }

        _ = self.add_struct(&NewLayerStyle {
            f_table_catalog: String::new(),
            f_table_schema: String::new(),
            f_table_name: table_name.to_owned(),
            f_geometry_column: geometry_column.to_owned(),
            style_name: style_name.to_owned(),
            style_qml: qml,
            style_sld: String::new(),
            use_as_default: true,
            description: String::new(),
            owner: String::new(),
            ui: None,
            update_time: None
        })?;
        Ok(())
    }

    #[cfg(test)]
    /// The QML of the default style for the layer, if it has one.
    pub(crate) fn default_style(&mut self, table_name: &str) -> Result<Option<String>,CommandError> {
        let mut result = None;
        for feature in self.read_features() {
            if feature.use_as_default()? && (feature.f_table_name()? == table_name) {
                result = Some(feature.style_qml()?);
            }
        }
        Ok(result)
    }

}
