use clap::Parser;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;

pub(crate) mod create_templates;
pub(crate) mod renumber;
mod docs;

use create_templates::CreateTemplates;
use renumber::Renumber;
use docs::Docs;

pub(crate) trait Task {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError>;

}

#[macro_export]
/// Declares the arguments of a subcommand. Doc comments become the command's help.
macro_rules! subcommand_def {
    ($(#[$attr: meta])* pub struct $name: ident {$($fields: tt)*}) => {
        #[derive(clap::Args)]
        $(#[$attr])*
        pub struct $name {$($fields)*}
    };
}

#[macro_export]
macro_rules! command_def {
    ($(#[$attr: meta])* $visibility: vis $struct_name: ident {$($command_name: ident),*$(,)?}) => {

        #[derive(clap::Subcommand)]
        $(#[$attr])*
        $visibility enum $struct_name {
            $(
                $command_name($command_name)
            ),*
        }

        impl $crate::commands::Task for $struct_name {

            fn run<Progress: $crate::progress::ProgressObserver>(self, progress: &mut Progress) -> Result<(),$crate::errors::CommandError> {
                match self {
                    $(Self::$command_name(a) => a.run(progress)),*
                }
            }

        }
    };
}

// "Docs" is hidden, it's only needed when preparing a release.

command_def!{
    #[command(disable_help_subcommand(true))]
    pub MainCommand {
        CreateTemplates,
        Renumber,
        Docs
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Tools for preparing and maintaining the layers of a municipal general plan (APP POG).
pub struct Narzedziownik {

    #[command(subcommand)]
    pub command: MainCommand

}

impl Task for Narzedziownik {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        self.command.run(progress)
    }
}
