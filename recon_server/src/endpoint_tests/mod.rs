mod helpers;
mod mocks;

mod health;
mod operator;
mod webhook;
