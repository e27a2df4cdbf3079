/*!
Blocking questions and messages shown to the user while a command runs.
*/

use console::style;
use console::Term;

pub(crate) trait Prompts {

    /// Asks the user to pick one of `items`. Returns the text of the chosen item, or whatever the user typed if it wasn't a choice, or None if they cancelled.
    fn choose(&mut self, title: &str, label: &str, items: &[&str], default: usize) -> Option<String>;

    /// Asks a yes or no question. Anything other than an explicit yes counts as no.
    fn confirm(&mut self, title: &str, question: &str) -> bool;

    fn inform(&mut self, title: &str, message: &str);

    fn warn(&mut self, title: &str, message: &str);

}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
/// Where informational messages go. Commands whose stdout is meant for another program send them to stderr.
pub(crate) enum MessageOutput {
    Stdout,
    Stderr
}

impl MessageOutput {

    fn term(self) -> Term {
        match self {
            Self::Stdout => Term::stdout(),
            Self::Stderr => Term::stderr()
        }
    }

}

pub(crate) struct ConsolePrompts {
    input: Term,
    output: Term,
    assume_yes: bool
}

impl ConsolePrompts {

    pub(crate) fn new(assume_yes: bool, messages: MessageOutput) -> Self {
        Self {
            input: Term::stderr(),
            output: messages.term(),
            assume_yes
        }
    }

    fn read_answer(&self, prompt: &str) -> Option<String> {
        self.input.write_str(prompt).ok()?;
        // an unattended terminal reads as an empty line
        let answer = self.input.read_line().ok()?;
        let answer = answer.trim();
        if answer.eq_ignore_ascii_case("q") {
            None
        } else {
            Some(answer.to_owned())
        }
    }

    fn write_message(term: &Term, title: &str, message: &str) {
        // there isn't anywhere else to report a failure to write to the terminal
        _ = term.write_line(&format!("{}",style(title).bold()));
        _ = term.write_line(message);
    }

}

impl Prompts for ConsolePrompts {

    fn choose(&mut self, title: &str, label: &str, items: &[&str], default: usize) -> Option<String> {
        Self::write_message(&self.input, title, label);
        for (i,item) in items.iter().enumerate() {
            let marker = if i == default { "*" } else { " " };
            _ = self.input.write_line(&format!(" {marker} {}) {item}",i + 1));
        }
        let answer = self.read_answer(&format!("Choose [{}, q to cancel]: ",default + 1))?;
        Some(select_item(&answer, items, default))
    }

    fn confirm(&mut self, title: &str, question: &str) -> bool {
        Self::write_message(&self.input, title, question);
        if self.assume_yes {
            _ = self.input.write_line("[y/N]: y");
            return true
        }
        self.read_answer("[y/N]: ").is_some_and(|answer| matches!(answer.to_lowercase().as_str(),"y" | "yes" | "t" | "tak"))
    }

    fn inform(&mut self, title: &str, message: &str) {
        Self::write_message(&self.output, title, message);
    }

    fn warn(&mut self, title: &str, message: &str) {
        Self::write_message(&self.input, &format!("{}",style(title).yellow()), &format!("{}",style(message).yellow()));
    }
}

/// An empty answer selects the default, a number selects that item, anything else is passed back as typed.
pub(crate) fn select_item(answer: &str, items: &[&str], default: usize) -> String {
    let answer = answer.trim();
    if answer.is_empty() {
        items.get(default).map_or_else(String::new, |item| (*item).to_owned())
    } else if let Some(item) = answer.parse::<usize>().ok().and_then(|index| index.checked_sub(1)).and_then(|index| items.get(index)) {
        (*item).to_owned()
    } else {
        answer.to_owned()
    }
}
