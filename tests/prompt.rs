use simple_chatbot::model::{ChatMessage, Role};
use simple_chatbot::prompt::{PromptTemplate, TemplateError};
use std::collections::HashMap;

#[test]
fn answer_template_renders_question_and_json_instruction() {
    let t = PromptTemplate::answer_json();
    assert_eq!(t.input_variables().unwrap(), vec!["question".to_string()]);

    let msgs = t.format(&HashMap::from([("question", "What is Rust?")])).unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0].role, Role::System);
    assert!(msgs[0].content.contains(r#"{"answer": "<your answer>"}"#));
    assert_eq!(msgs[1], ChatMessage::user("What is Rust?"));
}

#[test]
fn substitutes_repeated_and_multiple_variables() {
    let t = PromptTemplate::new(vec![
        (Role::System, "Speak as {persona}.".to_string()),
        (Role::User, "{ topic }, then {topic} again, {{literal}} and }} alone".to_string()),
    ]);
    assert_eq!(t.input_variables().unwrap(), vec!["persona".to_string(), "topic".to_string()]);

    let msgs = t.format(&HashMap::from([("persona", "a pirate"), ("topic", "ships")])).unwrap();
    assert_eq!(msgs[0].content, "Speak as a pirate.");
    assert_eq!(msgs[1].content, "ships, then ships again, {literal} and } alone");
}

#[test]
fn values_are_not_reinterpreted() {
    let t = PromptTemplate::new(vec![(Role::User, "{q}".to_string())]);
    let msgs = t.format(&HashMap::from([("q", "{not_a_var}")])).unwrap();
    assert_eq!(msgs[0].content, "{not_a_var}");
}

#[test]
fn missing_variable() {
    let t = PromptTemplate::answer_json();
    let err = t.format(&HashMap::new()).unwrap_err();
    assert_eq!(err, TemplateError::MissingVariable("question".to_string()));
}

#[test]
fn unclosed_placeholder() {
    let t = PromptTemplate::new(vec![(Role::User, "hello {name".to_string())]);
    assert_eq!(t.format(&HashMap::new()).unwrap_err(), TemplateError::Unclosed { offset: 6 });
    assert!(t.input_variables().is_err());
}
