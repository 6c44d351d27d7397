mod lib_name_test;
mod probe_test;
