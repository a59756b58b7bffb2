// src/service/sysv.rs

//! LSB init script generation for hosts without systemd

use super::ServiceOptions;

/// Install path of the init script once the installer copies it into place
pub fn init_script_path(name: &str) -> String {
    format!("/etc/init.d/{}", name)
}

/// Render an LSB-compliant init script for the wrapped program
pub fn render_init_script(options: &ServiceOptions) -> String {
    let name = &options.name;
    let program = &options.program;
    let args = shell_quote_args(&options.args);

    format!(
        r#"#!/bin/sh
### BEGIN INIT INFO
# Provides:          {name}
# Required-Start:    $remote_fs $syslog
# Required-Stop:     $remote_fs $syslog
# Default-Start:     2 3 4 5
# Default-Stop:      0 1 6
# Short-Description: {description}
# Description:       {description}
### END INIT INFO

name={name}
program={program}
args="{args}"
pidfile="/var/run/$name.pid"
user={user}
group={group}

[ -r /etc/default/$name ] && . /etc/default/$name

is_running() {{
  [ -f "$pidfile" ] && kill -0 "$(cat "$pidfile")" 2>/dev/null
}}

start() {{
  if is_running; then
    echo "$name is already running"
    return 0
  fi
  chroot --userspec "$user":"$group" / sh -c "exec \"\$0\" \"\$@\"" "$program" $args \
    >> /var/log/$name.log 2>> /var/log/$name.err &
  echo $! > "$pidfile"
  echo "$name started"
}}

stop() {{
  if is_running; then
    kill -TERM "$(cat "$pidfile")"
    for i in 1 2 3 4 5 6 7 8 9 10; do
      is_running || break
      sleep 1
    done
    if is_running; then
      kill -KILL "$(cat "$pidfile")"
    fi
  fi
  rm -f "$pidfile"
  echo "$name stopped"
}}

status() {{
  if is_running; then
    echo "$name is running"
    return 0
  fi
  echo "$name is not running"
  return 3
}}

case "$1" in
  start) start ;;
  stop) stop ;;
  status) status ;;
  restart|force-reload) stop && start ;;
  *)
    echo "Usage: $0 {{start|stop|status|restart|force-reload}}" >&2
    exit 3
    ;;
esac
"#,
        name = name,
        program = program,
        args = args,
        user = options.user,
        group = options.group,
        description = options.description,
    )
}

/// Quote arguments for embedding in a double-quoted shell assignment
fn shell_quote_args(args: &[String]) -> String {
    args.iter()
        .map(|arg| arg.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_init_script() {
        let options = ServiceOptions::new("tsuru", "/usr/bin/tsuru")
            .with_args(vec!["serve".to_string()])
            .with_description("tsuru client");
        let script = render_init_script(&options);

        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("# Provides:          tsuru\n"));
        assert!(script.contains("program=/usr/bin/tsuru\n"));
        assert!(script.contains("args=\"serve\"\n"));
        assert!(script.contains("restart|force-reload) stop && start ;;"));
        assert!(script.contains("{start|stop|status|restart|force-reload}"));
    }

    #[test]
    fn test_shell_quote_args() {
        let args = vec!["--name=\"x\"".to_string(), "$HOME".to_string()];
        assert_eq!(shell_quote_args(&args), "--name=\\\"x\\\" \\$HOME");
    }

    #[test]
    fn test_init_script_path() {
        assert_eq!(init_script_path("tsuru"), "/etc/init.d/tsuru");
    }
}
