// src/service/systemd.rs

//! Systemd unit generation for service-wrapped packages

use super::ServiceOptions;

/// Render a systemd service unit for the wrapped program
pub fn render_unit(options: &ServiceOptions) -> String {
    format!(
        "[Unit]\n\
         Description={description}\n\
         \n\
         [Service]\n\
         Type=simple\n\
         User={user}\n\
         Group={group}\n\
         EnvironmentFile=-/etc/default/{name}\n\
         ExecStart={exec}\n\
         Restart=always\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        description = options.description,
        user = options.user,
        group = options.group,
        name = options.name,
        exec = options.command_line(),
    )
}

/// Install path of the unit once the installer copies it into place
pub fn unit_path(name: &str) -> String {
    format!("/etc/systemd/system/{}.service", name)
}

/// Paths of the enablement symlinks `systemctl enable` creates for a unit
pub fn enablement_links(unit_content: &str, unit: &str) -> Vec<String> {
    let mut links = Vec::new();

    for target in parse_systemd_install_section(unit_content, "WantedBy") {
        links.push(format!("/etc/systemd/system/{}.wants/{}", target, unit));
    }
    for target in parse_systemd_install_section(unit_content, "RequiredBy") {
        links.push(format!("/etc/systemd/system/{}.requires/{}", target, unit));
    }

    links
}

/// Parse systemd unit file [Install] section for WantedBy/RequiredBy
///
/// Returns a list of target units that this unit should be linked to.
pub fn parse_systemd_install_section(content: &str, key: &str) -> Vec<String> {
    let mut results = Vec::new();
    let mut in_install = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('[') {
            in_install = trimmed == "[Install]";
            continue;
        }

        if !in_install {
            continue;
        }

        // Value can be space-separated list
        if let Some(value) = trimmed.strip_prefix(key)
            && let Some(value) = value.trim_start().strip_prefix('=')
        {
            results.extend(value.split_whitespace().map(str::to_string));
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_systemd_install_section() {
        let content = r#"[Unit]
Description=Test Service
After=network.target

[Service]
ExecStart=/usr/bin/test

[Install]
WantedBy=multi-user.target graphical.target
RequiredBy=critical.target
"#;

        let wants = parse_systemd_install_section(content, "WantedBy");
        assert_eq!(wants, vec!["multi-user.target", "graphical.target"]);

        let requires = parse_systemd_install_section(content, "RequiredBy");
        assert_eq!(requires, vec!["critical.target"]);
    }

    #[test]
    fn test_parse_systemd_install_section_ignores_other_sections() {
        let content = "[Service]\nWantedBy=bogus.target\nExecStart=/usr/bin/test\n";
        assert!(parse_systemd_install_section(content, "WantedBy").is_empty());
    }

    #[test]
    fn test_render_unit() {
        let options = ServiceOptions::new("tsuru", "/usr/bin/tsuru")
            .with_args(vec!["daemon".to_string(), "--verbose".to_string()])
            .with_description("tsuru client");
        let unit = render_unit(&options);

        assert!(unit.contains("Description=tsuru client\n"));
        assert!(unit.contains("ExecStart=/usr/bin/tsuru daemon --verbose\n"));
        assert!(unit.contains("EnvironmentFile=-/etc/default/tsuru\n"));
        assert!(unit.contains("User=root\n"));
    }

    #[test]
    fn test_enablement_links() {
        let options = ServiceOptions::new("tsuru", "/usr/bin/tsuru");
        let unit = render_unit(&options);

        assert_eq!(
            enablement_links(&unit, "tsuru.service"),
            vec!["/etc/systemd/system/multi-user.target.wants/tsuru.service"]
        );
        assert_eq!(unit_path("tsuru"), "/etc/systemd/system/tsuru.service");
    }
}
