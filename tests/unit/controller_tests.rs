use super::*;
use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Clone, Default)]
struct RecordingClipboard {
    copied: Rc<RefCell<Vec<String>>>,
    fail: bool,
}

impl ClipboardSink for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        if self.fail {
            return Err("no display".to_string());
        }
        self.copied.borrow_mut().push(text.to_string());
        Ok(())
    }
}

fn fake_tool(dir: &Path, body: &str) -> String {
    let path = dir.join("fake-gemini");
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake tool");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake tool");
    path.display().to_string()
}

fn tool_config(program: &str) -> ToolConfig {
    ToolConfig {
        program: program.to_string(),
        timeout_secs: 10,
        api_key_env: "GCC_TEST_API_KEY_NOT_SET".to_string(),
    }
}

fn controller_for(program: &str) -> (Controller, RecordingClipboard) {
    let clipboard = RecordingClipboard::default();
    let controller = Controller::new(tool_config(program), Box::new(clipboard.clone()));
    (controller, clipboard)
}

fn wait_until_idle(controller: &mut Controller, app: &mut App) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while controller.is_busy() && Instant::now() < deadline {
        controller.poll(app);
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!controller.is_busy(), "request did not finish in time");
}

fn process_gone(pid: &str, limit: Duration) -> bool {
    let alive = || {
        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    };
    let deadline = Instant::now() + limit;
    while alive() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
    true
}

fn last_entry(app: &App) -> &crate::app::TranscriptEntry {
    app.transcript().last().expect("transcript entry")
}

#[test]
fn success_appends_reply_and_records_turn() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), "echo hello"));
    let mut app = App::default();

    controller.submit_prompt(&mut app, "  hi  ").expect("submitted");
    assert!(app.is_busy());
    assert_eq!(app.status(), "Processing...");
    wait_until_idle(&mut controller, &mut app);

    let kinds = app
        .transcript()
        .iter()
        .map(|entry| (entry.kind, entry.text.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![(TranscriptKind::User, "hi"), (TranscriptKind::Reply, "hello")]
    );
    assert_eq!(controller.session().history_text(), "User: hi\nAI: hello\n");
    assert!(!app.is_busy());
    assert_eq!(app.status(), "Done.");
}

#[test]
fn follow_up_prompt_carries_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), "printf '%s' \"$4\""));
    let mut app = App::default();

    controller.submit_prompt(&mut app, "first").expect("submitted");
    wait_until_idle(&mut controller, &mut app);
    assert_eq!(last_entry(&app).text, "first");

    controller.submit_prompt(&mut app, "second").expect("submitted");
    wait_until_idle(&mut controller, &mut app);
    assert_eq!(
        last_entry(&app).text,
        "--- CONVERSATION HISTORY ---\nUser: first\nAI: first\n\n\n--- CURRENT PROMPT ---\nsecond"
    );
}

#[test]
fn selected_model_and_image_reach_the_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), "printf '%s ' \"$@\""));
    let mut app = App::default();
    app.next_model();
    controller.attach_image(&mut app, "/tmp/photo.png");

    controller.submit_prompt(&mut app, "look").expect("submitted");
    wait_until_idle(&mut controller, &mut app);
    assert_eq!(
        last_entry(&app).text,
        "--model gemini-2.5-flash --prompt look --image /tmp/photo.png"
    );
}

#[test]
fn stderr_of_a_success_goes_to_the_log_view() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) =
        controller_for(&fake_tool(dir.path(), "echo answer; echo 'loaded creds' 1>&2"));
    let mut app = App::default();

    controller.submit_prompt(&mut app, "q").expect("submitted");
    wait_until_idle(&mut controller, &mut app);
    assert_eq!(app.log_lines(), &["loaded creds".to_string()]);
}

#[test]
fn non_zero_exit_is_reported_and_not_recorded() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) =
        controller_for(&fake_tool(dir.path(), "echo partial; echo 'bad flag' 1>&2; exit 2"));
    let mut app = App::default();

    controller.submit_prompt(&mut app, "q").expect("submitted");
    wait_until_idle(&mut controller, &mut app);

    let entry = last_entry(&app);
    assert_eq!(entry.kind, TranscriptKind::Error);
    assert!(entry.text.starts_with("COMMAND FAILED (Exit Code: 2)"));
    assert!(entry.text.contains("bad flag"));
    assert!(entry.text.contains("partial"));
    assert_eq!(app.log_lines()[0], "COMMAND FAILED (Exit Code: 2)");
    assert!(controller.session().turns().is_empty());
    assert!(!app.is_busy());
}

#[test]
fn missing_tool_is_reported() {
    let (mut controller, _) = controller_for("__gcc_missing_tool__");
    let mut app = App::default();

    controller.submit_prompt(&mut app, "q").expect("submitted");
    wait_until_idle(&mut controller, &mut app);

    let entry = last_entry(&app);
    assert_eq!(entry.kind, TranscriptKind::Error);
    assert_eq!(
        entry.text,
        "FATAL: '__gcc_missing_tool__' command not found. Is it in your system's PATH?"
    );
}

#[test]
fn second_submission_is_rejected_while_busy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), "sleep 0.5; echo done"));
    let mut app = App::default();

    controller.submit_prompt(&mut app, "first").expect("submitted");
    assert_eq!(
        controller.submit_prompt(&mut app, "second"),
        Err(SubmitError::Busy)
    );

    app.insert_text("typed while busy");
    controller.submit_input(&mut app);
    assert_eq!(app.input(), "typed while busy");
    assert_eq!(app.status(), "Still processing the previous request.");

    wait_until_idle(&mut controller, &mut app);
    let user_entries = app
        .transcript()
        .iter()
        .filter(|entry| entry.kind == TranscriptKind::User)
        .count();
    assert_eq!(user_entries, 1);
    assert_eq!(controller.session().history_text(), "User: first\nAI: done\n");
}

#[test]
fn empty_prompt_is_not_sent() {
    let (mut controller, _) = controller_for("__gcc_missing_tool__");
    let mut app = App::default();
    assert_eq!(
        controller.submit_prompt(&mut app, " \n "),
        Err(SubmitError::EmptyPrompt)
    );
    assert!(!controller.is_busy());
    assert!(app.transcript().is_empty());
    assert!(controller.session().last_command().is_none());
}

#[test]
fn unreadable_context_file_is_logged_and_request_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), "echo ok"));
    let mut app = App::default();
    controller.attach_text(&mut app, &dir.path().join("gone.txt").display().to_string());

    controller.submit_prompt(&mut app, "q").expect("submitted");
    wait_until_idle(&mut controller, &mut app);

    assert!(app.log_lines()[0].starts_with("Failed to read "));
    assert_eq!(last_entry(&app).text, "ok");
}

#[test]
fn attaching_a_second_image_replaces_the_first() {
    let (mut controller, _) = controller_for("gemini");
    let mut app = App::default();
    controller.attach_text(&mut app, "/tmp/a.txt");
    controller.attach_image(&mut app, "/tmp/one.png");
    controller.attach_image(&mut app, "/tmp/two.JPG");

    assert_eq!(
        app.context_labels(),
        &["TXT: a.txt".to_string(), "IMAGE: two.JPG".to_string()]
    );
    assert_eq!(app.status(), "Image loaded: two.JPG");
    assert!(app.log_lines().is_empty());
}

#[test]
fn non_image_extension_is_attached_with_a_warning() {
    let (mut controller, _) = controller_for("gemini");
    let mut app = App::default();
    controller.attach_image(&mut app, "/tmp/diagram.svg");
    assert_eq!(controller.session().context.len(), 1);
    assert!(app.log_lines()[0].contains("diagram.svg"));
}

#[test]
fn blank_path_attaches_nothing() {
    let (mut controller, _) = controller_for("gemini");
    let mut app = App::default();
    controller.attach_text(&mut app, "   ");
    assert!(controller.session().context.is_empty());
    assert_eq!(app.status(), "No file selected.");
}

#[test]
fn clear_session_resets_state_but_keeps_last_command() {
    let dir = tempfile::tempdir().expect("tempdir");
    let tool = fake_tool(dir.path(), "echo reply");
    let (mut controller, clipboard) = controller_for(&tool);
    let mut app = App::default();
    controller.attach_text(&mut app, &dir.path().join("notes.txt").display().to_string());
    controller.submit_prompt(&mut app, "two words").expect("submitted");
    wait_until_idle(&mut controller, &mut app);

    controller.clear_session(&mut app);
    assert!(app.transcript().is_empty());
    assert!(app.log_lines().is_empty());
    assert!(app.context_labels().is_empty());
    assert!(controller.session().context.is_empty());
    assert!(controller.session().turns().is_empty());
    assert_eq!(app.status(), "Session cleared.");

    controller.copy_last_command(&mut app);
    assert_eq!(app.status(), "Last command copied.");
    let copied = clipboard.copied.borrow();
    assert_eq!(copied.len(), 1);
    assert_eq!(
        copied[0],
        format!("{tool} --model gemini-2.5-pro --prompt \"two words\"")
    );
}

#[test]
fn clear_while_busy_keeps_the_late_reply_in_the_new_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), "sleep 0.3; echo hello"));
    let mut app = App::default();
    controller.submit_prompt(&mut app, "hi").expect("submitted");

    controller.clear_session(&mut app);
    assert!(app.transcript().is_empty());
    assert!(controller.is_busy());

    wait_until_idle(&mut controller, &mut app);
    assert_eq!(controller.session().history_text(), "User: hi\nAI: hello\n");
    assert_eq!(last_entry(&app).kind, TranscriptKind::Reply);
    assert_eq!(last_entry(&app).text, "hello");
}

#[test]
fn shutdown_kills_the_running_tool() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pid_file = dir.path().join("pid");
    let body = format!("echo $$ > '{}'; sleep 30", pid_file.display());
    let (mut controller, _) = controller_for(&fake_tool(dir.path(), &body));
    let mut app = App::default();
    controller.submit_prompt(&mut app, "hi").expect("submitted");

    let deadline = Instant::now() + Duration::from_secs(5);
    let pid = loop {
        let pid = fs::read_to_string(&pid_file).unwrap_or_default();
        if pid.ends_with('\n') {
            break pid.trim().to_string();
        }
        assert!(Instant::now() < deadline, "tool never started");
        thread::sleep(Duration::from_millis(10));
    };

    controller.shutdown();
    assert!(!controller.is_busy());
    assert!(process_gone(&pid, Duration::from_secs(2)), "tool {pid} outlived shutdown");
}

#[test]
fn shutdown_when_idle_is_harmless() {
    let (mut controller, _) = controller_for("gemini");
    controller.shutdown();
    assert!(!controller.is_busy());
}

#[test]
fn copy_without_a_command_does_nothing() {
    let (mut controller, clipboard) = controller_for("gemini");
    let mut app = App::default();
    controller.copy_last_command(&mut app);
    assert_eq!(app.status(), "No command to copy yet.");
    assert!(clipboard.copied.borrow().is_empty());
}

#[test]
fn clipboard_failure_is_reported() {
    let clipboard = RecordingClipboard {
        fail: true,
        ..RecordingClipboard::default()
    };
    let mut controller = Controller::new(tool_config("__gcc_missing_tool__"), Box::new(clipboard));
    let mut app = App::default();
    controller.submit_prompt(&mut app, "q").expect("submitted");
    wait_until_idle(&mut controller, &mut app);

    controller.copy_last_command(&mut app);
    assert_eq!(app.status(), "Copy failed.");
    assert!(
        app.log_lines()
            .iter()
            .any(|line| line == "Clipboard unavailable: no display")
    );
}

#[test]
fn slash_commands_route_to_actions() {
    let (mut controller, _) = controller_for("gemini");
    let mut app = App::default();

    app.insert_text("/model gemini-2.5-flash");
    controller.submit_input(&mut app);
    assert_eq!(app.model(), "gemini-2.5-flash");
    assert!(app.input().is_empty());

    app.insert_text("/text /tmp/spec.txt");
    controller.submit_input(&mut app);
    assert_eq!(app.context_labels(), &["TXT: spec.txt".to_string()]);

    app.insert_text("/bogus");
    controller.submit_input(&mut app);
    assert_eq!(app.status(), "Unknown command: /bogus");

    app.insert_text("/exit");
    controller.submit_input(&mut app);
    assert!(!app.running);
    assert!(!controller.is_busy());
}

#[test]
fn path_prompt_attaches_entered_path() {
    let (mut controller, _) = controller_for("gemini");
    let mut app = App::default();
    app.open_path_prompt(PathPrompt::Image);
    app.insert_text("'/tmp/my cat.jpeg'");
    controller.submit_input(&mut app);

    assert!(app.path_prompt().is_none());
    assert_eq!(
        controller.session().context.image().map(|item| item.path.clone()),
        Some(PathBuf::from("/tmp/my cat.jpeg"))
    );
}

#[test]
fn startup_warns_when_api_key_is_missing() {
    let (mut controller, _) = controller_for("gemini");
    let mut app = App::default();
    controller.startup(&mut app);
    assert_eq!(
        last_entry(&app).text,
        "Warning: GCC_TEST_API_KEY_NOT_SET may not be set."
    );
    assert_eq!(last_entry(&app).kind, TranscriptKind::Log);
}

#[test]
fn parses_slash_commands_with_arguments() {
    assert_eq!(
        parse_slash_command("/image   /tmp/a b.png "),
        SlashCommand::Image("/tmp/a b.png".to_string())
    );
    assert_eq!(parse_slash_command("/model"), SlashCommand::Model(String::new()));
    assert_eq!(parse_slash_command("/quit"), SlashCommand::Quit);
    assert_eq!(
        parse_slash_command("/nope x"),
        SlashCommand::Unknown("/nope".to_string())
    );
}

#[test]
fn image_extension_check_is_case_insensitive() {
    assert!(has_image_extension(Path::new("a.PNG")));
    assert!(has_image_extension(Path::new("a.jpeg")));
    assert!(!has_image_extension(Path::new("a.gif")));
    assert!(!has_image_extension(Path::new("noext")));
}
