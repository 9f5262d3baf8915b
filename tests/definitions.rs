use std::fs;
use stepweaver::definition::{
    DefinitionError, DefinitionSources, HookKind, parse_action, parse_concept, parse_steps,
};
use tempfile::TempDir;

fn write(dir: &std::path::Path, name: &str, contents: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, contents).expect("write definition");
}

#[test]
fn conventional_layout_loads_every_kind() {
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();

    write(
        root,
        "steps/login.steps",
        "Step: I log in as {{user}}\n\
         Login: log in as [[user]]\n\
         aiAssert: the dashboard is visible\n\
         \n\
         Step: I open the main page\n\
         browser: open http://localhost:3000\n",
    );
    write(
        root,
        "concepts/login.concept",
        "Concept: Login\n\
         Behavior: log in as {{user}}\n\
         aiInput([[user]]): the user name field\n\
         aiTap: the sign-in button\n",
    );
    write(
        root,
        "hooks/browser.hooks",
        "Before: @ui and not @skip\n\
         browser: open http://localhost:3000\n\
         After:\n\
         browser: quit\n",
    );

    let definitions = DefinitionSources::under(root).load().expect("load");

    assert_eq!(definitions.steps.len(), 2);
    assert_eq!(definitions.steps[0].text, "I log in as {{user}}");
    assert_eq!(definitions.steps[0].actions[0].name, "Login");
    assert_eq!(definitions.steps[0].actions[0].text, "log in as [[user]]");

    let login = definitions.concept("Login").expect("concept");
    assert_eq!(login.patterns(), vec!["log in as {{user}}".to_string()]);
    let input = &login.behaviors[0].actions[0];
    assert_eq!(input.name, "aiInput");
    assert_eq!(input.arg.as_deref(), Some("[[user]]"));
    assert_eq!(input.text, "the user name field");

    assert_eq!(definitions.hooks.len(), 2);
    assert_eq!(definitions.hooks_for(HookKind::Before, &["@ui"]).count(), 1);
    assert_eq!(definitions.hooks_for(HookKind::Before, &["@ui", "@skip"]).count(), 0);
    let no_tags: [&str; 0] = [];
    assert_eq!(definitions.hooks_for(HookKind::After, &no_tags).count(), 1);
}

#[test]
fn missing_subdirectories_are_skipped() {
    let temp = TempDir::new().expect("tempdir");
    write(temp.path(), "steps/a.steps", "Step: one\nai: do one\n");

    let sources = DefinitionSources::under(temp.path());
    assert!(sources.concepts.is_none());
    assert!(sources.hooks.is_none());

    let definitions = sources.load().expect("load");
    assert_eq!(definitions.steps.len(), 1);
    assert!(definitions.concepts.is_empty());
}

#[test]
fn malformed_source_fails_the_whole_load() {
    let temp = TempDir::new().expect("tempdir");
    write(temp.path(), "steps/good.steps", "Step: fine\nai: ok\n");
    write(temp.path(), "steps/bad.steps", "Step: broken\nthis line has no delimiter\n");

    let err = DefinitionSources::under(temp.path()).load().unwrap_err();
    match err {
        DefinitionError::Format { line, .. } => assert_eq!(line, "this line has no delimiter"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn action_text_keeps_later_colons() {
    let action = parse_action("browser: open http://localhost:3000/a:b").expect("parse");
    assert_eq!(action.name, "browser");
    assert_eq!(action.text, "open http://localhost:3000/a:b");
    assert_eq!(action.arg, None);
}

#[test]
fn concept_and_step_errors_are_format_errors() {
    assert!(matches!(
        parse_concept("Behavior: orphan\nai: x"),
        Err(DefinitionError::Format { .. })
    ));
    assert!(matches!(
        parse_steps("ai: before any step"),
        Err(DefinitionError::Format { .. })
    ));
    assert!(matches!(
        parse_action("name:"),
        Err(DefinitionError::Format { .. })
    ));
}
