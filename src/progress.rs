/*!
Progress reporting. Commands report through the `ProgressObserver` trait, which is drawn on the console by `ConsoleProgressBar` and ignored by `()` in tests.
*/

use core::time::Duration;

use console::style;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;

pub(crate) trait ProgressObserver {

    // messages come from callbacks so an observer that ignores them doesn't pay for formatting
    fn start<Message: AsRef<str>, Callback: FnOnce() -> (Message,Option<usize>)>(&mut self, callback: Callback);

    fn start_unknown_endpoint<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback);

    fn update<Callback: FnOnce() -> usize>(&self, callback: Callback);

    fn announce<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback);

    fn warning<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback);

    fn finish<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback);

}

impl ProgressObserver for () {

    fn start<Message: AsRef<str>, Callback: FnOnce() -> (Message,Option<usize>)>(&mut self, _: Callback) {
    }

    fn start_unknown_endpoint<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, _: Callback) {
    }

    fn update<Callback: FnOnce() -> usize>(&self, _: Callback) {
    }

    fn announce<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, _: Callback) {
    }

    fn warning<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, _: Callback) {
    }

    fn finish<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, _: Callback) {
    }
}

#[derive(Clone,Copy)]
enum BarStage {
    Waiting,
    Counting,
    Done
}

impl BarStage {

    fn apply(self, bar: &ProgressBar) {
        match self {
            Self::Waiting => {
                bar.enable_steady_tick(Duration::from_millis(120));
                bar.set_style(ProgressStyle::with_template("{spinner} {msg} ({elapsed})").unwrap_or_else(|_| ProgressStyle::default_spinner()));
            },
            Self::Counting => {
                bar.disable_steady_tick();
                bar.set_style(ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
                    .map_or_else(|_| ProgressStyle::default_bar(), |style| style.progress_chars("#- ")));
            },
            Self::Done => {
                bar.set_style(ProgressStyle::with_template("{msg} ({elapsed})").unwrap_or_else(|_| ProgressStyle::default_bar()));
            }
        }
    }

}

/// Draws one bar or spinner at a time on stderr, leaving stdout for the command's output.
pub(crate) struct ConsoleProgressBar {
    current: Option<ProgressBar>
}

impl ConsoleProgressBar {

    pub(crate) const fn new() -> Self {
        Self {
            current: None
        }
    }

    fn begin(&mut self, message: &str, step_count: Option<usize>) {
        let (bar,stage) = match (self.current.take(),step_count) {
            (Some(bar),Some(step_count)) => {
                bar.reset();
                bar.set_length(step_count as u64);
                (bar,BarStage::Counting)
            },
            (Some(bar),None) => {
                bar.reset();
                (bar,BarStage::Waiting)
            },
            (None,Some(step_count)) => (ProgressBar::new(step_count as u64),BarStage::Counting),
            (None,None) => (ProgressBar::new_spinner(),BarStage::Waiting)
        };
        stage.apply(&bar);
        bar.set_message(message.to_owned());
        self.current = Some(bar);
    }

    fn print_line(&self, line: String) {
        match &self.current {
            Some(bar) => bar.println(line),
            None => eprintln!("{line}")
        }
    }

}

impl ProgressObserver for ConsoleProgressBar {

    fn start<Message: AsRef<str>, Callback: FnOnce() -> (Message,Option<usize>)>(&mut self, callback: Callback) {
        let (message,step_count) = callback();
        self.begin(message.as_ref(), step_count);
    }

    fn start_unknown_endpoint<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback) {
        self.begin(callback().as_ref(), None);
    }

    fn update<Callback: FnOnce() -> usize>(&self, callback: Callback) {
        if let Some(bar) = &self.current {
            bar.set_position(callback() as u64);
        }
    }

    fn announce<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback) {
        self.print_line(format!("{} {}",style("::").cyan().bold(),callback().as_ref()));
    }

    fn warning<Message: AsRef<str>, Callback: FnOnce() -> Message>(&self, callback: Callback) {
        self.print_line(format!("{} {}",style("warning:").yellow().bold(),style(callback().as_ref()).yellow()));
    }

    fn finish<Message: AsRef<str>, Callback: FnOnce() -> Message>(&mut self, callback: Callback) {
        if let Some(bar) = self.current.take() {
            BarStage::Done.apply(&bar);
            bar.finish_with_message(callback().as_ref().to_owned());
        }
    }

}

/// Reports the position of an iterator as it is consumed, and finishes the progress once when it runs out.
pub(crate) struct IteratorWatcher<'progress, Message: AsRef<str>, Progress: ProgressObserver, IteratorType> {
    inner: IteratorType,
    progress: &'progress mut Progress,
    finish: Option<Message>,
    position: usize
}

impl<Message: AsRef<str>, Progress: ProgressObserver, IteratorType: Iterator> Iterator for IteratorWatcher<'_,Message,Progress,IteratorType> {

    type Item = IteratorType::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.inner.next();
        if next.is_some() {
            self.position += 1;
            let position = self.position;
            self.progress.update(|| position);
        } else if let Some(finish) = self.finish.take() {
            self.progress.finish(|| finish);
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }

}

pub(crate) trait WatchableIterator: Iterator + Sized {

    fn watch<StartMessage: AsRef<str>, FinishMessage: AsRef<str>, Progress: ProgressObserver>(self, progress: &mut Progress, start: StartMessage, finish: FinishMessage) -> IteratorWatcher<'_, FinishMessage, Progress, Self>;
}

impl<IteratorType: Iterator> WatchableIterator for IteratorType {

    fn watch<StartMessage: AsRef<str>, FinishMessage: AsRef<str>, Progress: ProgressObserver>(self, progress: &mut Progress, start: StartMessage, finish: FinishMessage) -> IteratorWatcher<'_, FinishMessage, Progress, Self> {
        progress.start(|| (start,self.size_hint().1));
        IteratorWatcher {
            inner: self,
            progress,
            finish: Some(finish),
            position: 0
        }
    }

}
