//! Export command

use anyhow::{Context, Result};
use bakctl_backup::{export, ExportForm, ScriptKind};
use std::path::Path;

use crate::cli::ExportArgs;
use crate::commands::resolve_tasks;
use crate::output;
use crate::utils::{open_store, program_name};

pub fn run(args: ExportArgs) -> Result<()> {
    let form = args.form()?;
    let selection = args.selection.selection()?;
    let store = open_store()?;
    let tasks = resolve_tasks(&store, &selection)?;

    let text = export(&program_name(), &tasks, form).context("Failed to export tasks")?;

    match &args.output {
        Some(path) => {
            write_output(path, &text, form)?;
            output::success(&format!(
                "Exported {} task(s) to {}",
                tasks.len(),
                path.display()
            ));
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn write_output(path: &Path, text: &str, form: ExportForm) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;

    #[cfg(unix)]
    if form == ExportForm::Script(ScriptKind::Sh) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to make {} executable", path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = form;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.sh");
        write_output(&path, "#!/usr/bin/env bash\n", ExportForm::Script(ScriptKind::Sh)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "#!/usr/bin/env bash\n"
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
