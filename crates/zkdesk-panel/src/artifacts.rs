use std::fs;
use std::path::{Path, PathBuf};

use zkdesk_proto::Params;

use crate::controller::PanelController;
use crate::error::PanelError;
use crate::presenter::PresentationUpdate;

/// Write the panel's in-memory params, byte for byte, to `<panel>.zkp`
/// under `dir`.
pub fn export_params(ctrl: &PanelController, dir: &Path) -> Result<PathBuf, PanelError> {
    let params = ctrl.params().ok_or(PanelError::MissingParams)?;
    let path = dir.join(format!("{}.zkp", ctrl.panel()));
    zkdesk_util::write_atomic(&path, params.as_str().as_bytes())?;
    Ok(path)
}

/// Read a params file and install its full contents as the panel's params,
/// through the same path a live generate success takes. The executor and
/// the request channel are not involved.
pub fn import_params_file(
    ctrl: &mut PanelController,
    path: &Path,
) -> Result<PresentationUpdate, PanelError> {
    let text = fs::read_to_string(path)?;
    Ok(ctrl.import_params(Params::new(text)))
}
