pub mod compat_matcher;
