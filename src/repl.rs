//! Line commands understood by `attune chat`.

/// One line of user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Say(String),
    Tasks,
    Done(String),
    Ui(Option<String>),
    Layout,
    Profile,
    Reconnect,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Say(line.to_owned());
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };
        match (name, arg) {
            ("tasks", _) => Self::Tasks,
            ("done", Some(id)) => Self::Done(id.to_owned()),
            ("ui", arg) => Self::Ui(arg.map(str::to_owned)),
            ("layout", _) => Self::Layout,
            ("profile", _) => Self::Profile,
            ("reconnect", _) => Self::Reconnect,
            ("help", _) => Self::Help,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Unknown(line.to_owned()),
        }
    }
}

pub const HELP: &str = "\
commands:
  <text>          send a chat message
  /tasks          list tasks
  /done <id>      toggle a task between completed and todo
  /ui [context]   ask the server for a new UI configuration
  /layout         show the resolved view parameters
  /profile        show what the assistant has learned about you
  /reconnect      force a reconnect
  /quit           leave";
