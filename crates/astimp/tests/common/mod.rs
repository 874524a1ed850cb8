#![allow(dead_code)]

use astimp::Image;

pub mod synthetic_plate;
