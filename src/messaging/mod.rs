// Messaging - Channels between the engine task, its handles and the audio backend

pub mod channels;
pub mod command;

pub use channels::{
    CommandReceiver, CommandSender, TriggerConsumer, TriggerProducer, create_command_channel,
    create_trigger_channel,
};
pub use command::Command;
