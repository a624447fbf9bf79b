mod matcher;
mod support;
