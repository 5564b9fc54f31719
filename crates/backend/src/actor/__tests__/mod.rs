mod helpers;
mod pipeline;
mod recovery;
