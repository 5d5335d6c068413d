// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates ephemeron.yml template files.

use std::path::Path;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, project: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let Some(p) = project {
        if p.trim().is_empty() {
            return Err(Error::InvalidConfig("project cannot be empty".to_string()));
        }
        config.project = p.to_string();
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    format!(
        r#"project: {project}

outputs:
  file: {outputs_file}
  stack: "{stack}"

instance:
  image_id: {image_id}
  instance_type: {instance_type}
  instance_profile: "{instance_profile}"
  ssh_user: {ssh_user}
  # user_data: user-data.sh
  # settle_delay: 60s

app:
  repo_url: {{ env: APP_REPO_URL }}
  target_dir: {target_dir}
  port: {port}

payload:
  script: {script}
  files:
    - secrets_manager.py

healthcheck:
  interval: 2s
  timeout: 30s

rollback:
  cluster: "{cluster}"
  service: "{service}"

# environments:
#   prod:
#     instance:
#       instance_type: t3.small
"#,
        project = config.project,
        outputs_file = config.outputs.file.display(),
        stack = config.outputs.stack,
        image_id = config.instance.image_id,
        instance_type = config.instance.instance_type,
        instance_profile = config.instance.instance_profile,
        ssh_user = config.instance.ssh_user,
        target_dir = config.app.target_dir,
        port = config.app.port,
        script = config.payload.script.display(),
        cluster = config.rollback.cluster,
        service = config.rollback.service,
    )
}
