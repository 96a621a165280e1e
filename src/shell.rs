//! Interactive command shell.
//!
//! Reads a command name per line, then prompts for that command's arguments
//! on the following lines. Works over any `BufRead`/`Write` pair so the same
//! code drives stdin/stdout and tests. Failed commands print their error and
//! the shell carries on.

use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::store::TweetStore;
use crate::tweet::{Tweet, TweetId};

pub const PROMPT: &str = "Tweeter >> ";

const COMMANDS: &[(&str, &str)] = &[
    ("publishTweet", "Publishes a tweet"),
    ("publishImageTweet", "Publishes a tweet with an image"),
    ("publishQuoteTweet", "Publishes a tweet with a quote"),
    ("showTweet", "Shows the last tweet"),
    ("showTweets", "Shows all the tweets"),
    ("showTweetById", "Shows the tweet with the provided id"),
    ("countTweetsByUser", "Counts the tweets published by the user"),
    ("showTweetsByUser", "Shows the tweets published by the user"),
    ("searchTweets", "Searches the tweets containing a term"),
    ("help", "Shows this list"),
    ("exit", "Leaves the shell"),
];

pub struct Shell<'st, R, W> {
    store: &'st TweetStore,
    input: R,
    output: W,
}

impl<'st, R: BufRead, W: Write> Shell<'st, R, W> {
    pub fn new(store: &'st TweetStore, input: R, output: W) -> Self {
        Self { store, input, output }
    }
    pub fn into_output(self) -> W {
        self.output
    }
    /// Runs until `exit` or end of input.
    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.output, "Type 'help' to know commands")?;
        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else { break };
            let command = line.trim();
            if command.is_empty() {
                continue;
            }
            if command == "exit" {
                break;
            }
            debug!(command, "shell command");
            self.execute(command)?;
        }
        Ok(())
    }
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
    // a missing answer (end of input) reads as an empty string
    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{question}")?;
        self.output.flush()?;
        Ok(self.read_line()?.unwrap_or_default())
    }
    fn ask_id(&mut self, question: &str) -> io::Result<Option<TweetId>> {
        let raw = self.ask(question)?;
        match raw.trim().parse::<TweetId>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                writeln!(self.output, "'{raw}' is not a tweet id")?;
                Ok(None)
            }
        }
    }
    fn execute(&mut self, command: &str) -> io::Result<()> {
        match command {
            "publishTweet" => {
                let user = self.ask("Type your username: ")?;
                let text = self.ask("Type your tweet: ")?;
                self.publish(Tweet::text(user, text))
            }
            "publishImageTweet" => {
                let user = self.ask("Type your username: ")?;
                let text = self.ask("Type your tweet: ")?;
                let url = self.ask("Type the url of your image: ")?;
                self.publish(Tweet::image(user, text, url))
            }
            "publishQuoteTweet" => {
                let user = self.ask("Type your username: ")?;
                let text = self.ask("Type your tweet: ")?;
                let Some(id) = self.ask_id("Type the id of the tweet you want to quote: ")? else {
                    return Ok(());
                };
                match self.store.get_by_id(id) {
                    Ok(quoted) => self.publish(Tweet::quote(user, text, quoted)),
                    Err(e) => writeln!(self.output, "Error publishing tweet: {e}"),
                }
            }
            "showTweet" => match self.store.get_last() {
                Ok(tweet) => writeln!(self.output, "{tweet}"),
                Err(e) => writeln!(self.output, "{e}"),
            },
            "showTweets" => {
                let tweets = self.store.get_all();
                self.print_all(&tweets)
            }
            "showTweetById" => {
                let Some(id) = self.ask_id("Type the id: ")? else {
                    return Ok(());
                };
                match self.store.get_by_id(id) {
                    Ok(tweet) => writeln!(self.output, "{tweet}"),
                    Err(e) => writeln!(self.output, "{e}"),
                }
            }
            "countTweetsByUser" => {
                let user = self.ask("Type the user: ")?;
                let count = self.store.count_by_user(&user);
                writeln!(self.output, "{count}")
            }
            "showTweetsByUser" => {
                let user = self.ask("Type the user: ")?;
                let tweets = self.store.get_by_user(&user);
                self.print_all(&tweets)
            }
            "searchTweets" => {
                let query = self.ask("Type the text to search: ")?;
                let mut found = 0usize;
                for tweet in self.store.search_containing(query) {
                    writeln!(self.output, "{tweet}")?;
                    found += 1;
                }
                writeln!(self.output, "{found} tweet(s) found")
            }
            "help" => {
                for (name, help) in COMMANDS {
                    writeln!(self.output, "{name:<20}{help}")?;
                }
                Ok(())
            }
            unknown => writeln!(self.output, "Unknown command '{unknown}', type 'help' to know commands"),
        }
    }
    fn publish(&mut self, tweet: Tweet) -> io::Result<()> {
        match self.store.publish(tweet) {
            Ok(id) => writeln!(self.output, "Tweet sent with id: {id}"),
            Err(e) => writeln!(self.output, "Error publishing tweet: {e}"),
        }
    }
    fn print_all(&mut self, tweets: &[std::sync::Arc<Tweet>]) -> io::Result<()> {
        for tweet in tweets {
            writeln!(self.output, "{}: {tweet}", tweet.id().unwrap_or_default())?;
        }
        Ok(())
    }
}
